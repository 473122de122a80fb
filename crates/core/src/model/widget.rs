use crate::model::ids::{SheetId, WidgetId};

/// A home-screen widget and the sheet it displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Widget {
    id: WidgetId,
    sheet_id: SheetId,
}

impl Widget {
    #[must_use]
    pub fn new(id: WidgetId, sheet_id: SheetId) -> Self {
        Self { id, sheet_id }
    }

    #[must_use]
    pub fn id(&self) -> WidgetId {
        self.id
    }

    #[must_use]
    pub fn sheet_id(&self) -> SheetId {
        self.sheet_id
    }
}
