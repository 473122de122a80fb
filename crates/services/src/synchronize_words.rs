use std::sync::Arc;

use storage::repository::{SheetRepository, StorageError, WidgetRepository};
use words_core::Clock;
use words_core::model::WidgetId;

use crate::error::WidgetServiceError;
use crate::refresh::WidgetRefresher;
use crate::sync_state::SynchronizationState;
use crate::words_cache::WordsCache;

/// Refreshes the cached words of an existing widget.
///
/// Two runs for the same widget are not serialized here; the host's job
/// scheduler is expected to keep at most one in flight per widget.
#[derive(Clone)]
pub struct SynchronizeWords {
    clock: Clock,
    widgets: Arc<dyn WidgetRepository>,
    sheets: Arc<dyn SheetRepository>,
    words: WordsCache,
    state: SynchronizationState,
    refresher: Arc<dyn WidgetRefresher>,
}

impl SynchronizeWords {
    #[must_use]
    pub fn new(
        clock: Clock,
        widgets: Arc<dyn WidgetRepository>,
        sheets: Arc<dyn SheetRepository>,
        words: WordsCache,
        state: SynchronizationState,
        refresher: Arc<dyn WidgetRefresher>,
    ) -> Self {
        Self {
            clock,
            widgets,
            sheets,
            words,
            state,
            refresher,
        }
    }

    /// Synchronize one widget's sheet.
    ///
    /// Returns `Ok(false)` when the widget (or its sheet) no longer exists,
    /// including when it is deleted while the fetch is in flight, or when the
    /// remote fetch failed; retrying is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns `WidgetServiceError::Storage` if the local store fails.
    pub async fn run(&self, widget_id: WidgetId) -> Result<bool, WidgetServiceError> {
        let Some(widget) = self.widgets.get_widget(widget_id).await? else {
            tracing::error!(%widget_id, "cannot synchronize words: widget not found");
            return Ok(false);
        };
        let Some(sheet) = self.sheets.get_sheet(widget.sheet_id()).await? else {
            tracing::error!(%widget_id, sheet_id = %widget.sheet_id(), "cannot synchronize words: sheet not found");
            return Ok(false);
        };

        self.refresher.request_refresh(widget_id);

        self.state
            .notify_for_action(widget_id, async {
                let synchronized = self
                    .words
                    .synchronize_words(sheet.id(), sheet.remote_id())
                    .await?;
                if !synchronized {
                    return Ok::<_, WidgetServiceError>(false);
                }
                match self
                    .sheets
                    .update_last_synchronized_at(sheet.id(), self.clock.now())
                    .await
                {
                    Ok(()) => Ok(true),
                    Err(StorageError::NotFound) => {
                        tracing::error!(%widget_id, sheet_id = %sheet.id(), "cannot record synchronization: sheet not found");
                        Ok(false)
                    }
                    Err(err) => Err(WidgetServiceError::from(err)),
                }
            })
            .await
    }

    /// Synchronize every known widget one after another.
    ///
    /// A storage failure for one widget is logged and recorded as `false`
    /// so the remaining widgets still run.
    ///
    /// # Errors
    ///
    /// Returns `WidgetServiceError::Storage` if the widget list cannot be read.
    pub async fn run_all(&self) -> Result<Vec<(WidgetId, bool)>, WidgetServiceError> {
        let widgets = self.widgets.list_widgets().await?;
        let mut outcomes = Vec::with_capacity(widgets.len());
        for widget in widgets {
            let widget_id = widget.id();
            let ok = match self.run(widget_id).await {
                Ok(ok) => ok,
                Err(err) => {
                    tracing::error!(%widget_id, error = %err, "synchronizing widget failed");
                    false
                }
            };
            outcomes.push((widget_id, ok));
        }
        Ok(outcomes)
    }
}
