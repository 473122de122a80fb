use std::sync::Arc;

use storage::observe::Observation;
use storage::repository::{SheetRepository, WidgetRepository};
use words_core::model::{Sheet, Widget, WidgetId};

use crate::error::WidgetServiceError;

/// Read side of the widget store.
#[derive(Clone)]
pub struct WidgetService {
    widgets: Arc<dyn WidgetRepository>,
    sheets: Arc<dyn SheetRepository>,
}

impl WidgetService {
    #[must_use]
    pub fn new(widgets: Arc<dyn WidgetRepository>, sheets: Arc<dyn SheetRepository>) -> Self {
        Self { widgets, sheets }
    }

    /// # Errors
    ///
    /// Returns `WidgetServiceError::Storage` if repository access fails.
    pub async fn get_widget(&self, id: WidgetId) -> Result<Option<Widget>, WidgetServiceError> {
        Ok(self.widgets.get_widget(id).await?)
    }

    /// Live widget value; yields `None` once the widget is deleted.
    #[must_use]
    pub fn observe_widget(&self, id: WidgetId) -> Observation<Option<Widget>> {
        let widgets = Arc::clone(&self.widgets);
        Observation::new(self.widgets.changes(), move || {
            let widgets = Arc::clone(&widgets);
            async move { widgets.get_widget(id).await }
        })
    }

    /// Widget together with the sheet it displays.
    ///
    /// # Errors
    ///
    /// Returns `WidgetServiceError::Storage` if repository access fails.
    pub async fn widget_with_sheet(
        &self,
        id: WidgetId,
    ) -> Result<Option<(Widget, Sheet)>, WidgetServiceError> {
        let Some(widget) = self.widgets.get_widget(id).await? else {
            return Ok(None);
        };
        let sheet = self.sheets.get_sheet(widget.sheet_id()).await?;
        Ok(sheet.map(|sheet| (widget, sheet)))
    }

    /// # Errors
    ///
    /// Returns `WidgetServiceError::Storage` if repository access fails.
    pub async fn list_widgets(&self) -> Result<Vec<Widget>, WidgetServiceError> {
        Ok(self.widgets.list_widgets().await?)
    }
}
