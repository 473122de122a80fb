use std::sync::Arc;

use storage::repository::{SheetRepository, WidgetRepository};
use words_core::model::WidgetId;

use crate::error::WidgetServiceError;
use crate::words_cache::WordsCache;

/// Removes a widget and, with its last reference, the sheet's cached words.
#[derive(Clone)]
pub struct DeleteWidget {
    widgets: Arc<dyn WidgetRepository>,
    sheets: Arc<dyn SheetRepository>,
    words: WordsCache,
}

impl DeleteWidget {
    #[must_use]
    pub fn new(
        widgets: Arc<dyn WidgetRepository>,
        sheets: Arc<dyn SheetRepository>,
        words: WordsCache,
    ) -> Self {
        Self {
            widgets,
            sheets,
            words,
        }
    }

    /// Delete `widget_id`. A missing widget is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns `WidgetServiceError::Storage` if repository access fails.
    pub async fn run(&self, widget_id: WidgetId) -> Result<(), WidgetServiceError> {
        let Some(widget) = self.widgets.get_widget(widget_id).await? else {
            tracing::error!(%widget_id, "cannot delete widget: widget not found");
            return Ok(());
        };
        let sheet_id = widget.sheet_id();

        self.widgets.delete_widget(widget_id).await?;

        if self.sheets.exists(sheet_id).await? {
            let remaining = self.widgets.count_widgets_for_sheet(sheet_id).await?;
            tracing::info!(%widget_id, %sheet_id, remaining, "deleted widget; sheet still shared");
        } else {
            self.words.delete_words(sheet_id).await?;
            tracing::info!(%widget_id, %sheet_id, "deleted widget and its orphaned sheet");
        }
        Ok(())
    }
}
