use std::sync::Arc;

use storage::repository::{SheetRepository, StorageError, WidgetRepository};
use words_core::model::{NewSheet, SheetId, SheetRemoteId, WidgetId};

use crate::error::WidgetServiceError;
use crate::words_cache::WordsCache;

/// Creates a widget, sharing an existing sheet or creating and filling a new one.
#[derive(Clone)]
pub struct AddWidget {
    widgets: Arc<dyn WidgetRepository>,
    sheets: Arc<dyn SheetRepository>,
    words: WordsCache,
}

impl AddWidget {
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

    /// Add `widget_id` showing the sheet described by `new_sheet`.
    ///
    /// A sheet already cached for the same remote id is reused as is. A new
    /// sheet is only kept if its words were fetched and the widget row was
    /// written; otherwise it is deleted again and `Ok(false)` is returned.
    /// Dropping the returned future mid-way also deletes the new sheet.
    ///
    /// # Errors
    ///
    /// Returns `WidgetServiceError::Storage` with `StorageError::Conflict` when
    /// the widget id is already taken, or any storage error on the shared
    /// sheet path.
    pub async fn run(
        &self,
        widget_id: WidgetId,
        new_sheet: NewSheet,
    ) -> Result<bool, WidgetServiceError> {
        if let Some(existing) = self.sheets.get_by_remote_id(new_sheet.remote_id()).await? {
            self.widgets.add_widget(widget_id, existing.id()).await?;
            tracing::info!(%widget_id, sheet_id = %existing.id(), "widget added to existing sheet");
            return Ok(true);
        }

        let remote_id = new_sheet.remote_id().clone();
        let sheet = self.sheets.add_sheet(new_sheet).await?;
        let rollback = SheetRollback::arm(Arc::clone(&self.sheets), sheet.id());

        match self.fill_new_sheet(widget_id, sheet.id(), &remote_id).await {
            Ok(true) => {
                rollback.disarm();
                tracing::info!(%widget_id, sheet_id = %sheet.id(), "widget added with new sheet");
                Ok(true)
            }
            Ok(false) => {
                rollback.run().await;
                Ok(false)
            }
            Err(err) => {
                tracing::error!(%widget_id, %remote_id, error = %err, "adding widget failed");
                rollback.run().await;
                match err {
                    StorageError::Conflict(_) => Err(err.into()),
                    _ => Ok(false),
                }
            }
        }
    }

    async fn fill_new_sheet(
        &self,
        widget_id: WidgetId,
        sheet_id: SheetId,
        remote_id: &SheetRemoteId,
    ) -> Result<bool, StorageError> {
        if !self.words.synchronize_words(sheet_id, remote_id).await? {
            return Ok(false);
        }
        self.widgets.add_widget(widget_id, sheet_id).await?;
        Ok(true)
    }
}

/// Deletes a freshly inserted sheet unless disarmed.
///
/// If the guard is dropped while armed (the caller abandoned the future),
/// the delete is spawned on the current runtime so it completes on its own.
struct SheetRollback {
    sheets: Arc<dyn SheetRepository>,
    sheet_id: SheetId,
    armed: bool,
}

impl SheetRollback {
    fn arm(sheets: Arc<dyn SheetRepository>, sheet_id: SheetId) -> Self {
        Self {
            sheets,
            sheet_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }

    /// Delete inline. Stays armed until the delete finishes, so dropping
    /// this future part way still hands the delete to the runtime.
    async fn run(mut self) {
        delete_sheet(Arc::clone(&self.sheets), self.sheet_id).await;
        self.armed = false;
    }
}

impl Drop for SheetRollback {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let sheets = Arc::clone(&self.sheets);
        let sheet_id = self.sheet_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(delete_sheet(sheets, sheet_id));
            }
            Err(_) => {
                tracing::error!(%sheet_id, "no runtime to roll back abandoned sheet");
            }
        }
    }
}

async fn delete_sheet(sheets: Arc<dyn SheetRepository>, sheet_id: SheetId) {
    match sheets.delete_sheet(sheet_id).await {
        Ok(()) => tracing::info!(%sheet_id, "rolled back new sheet"),
        Err(err) => tracing::error!(%sheet_id, error = %err, "rolling back new sheet failed"),
    }
}
