use std::sync::Arc;

use storage::repository::Storage;
use words_core::Clock;

use crate::add_widget::AddWidget;
use crate::delete_widget::DeleteWidget;
use crate::error::AppServicesError;
use crate::refresh::WidgetRefresher;
use crate::remote::{RemoteWordSource, SheetsExportClient};
use crate::sync_state::SynchronizationState;
use crate::synchronize_words::SynchronizeWords;
use crate::widget_service::WidgetService;
use crate::words_cache::WordsCache;

/// Wires the use cases over one storage backend and remote source.
#[derive(Clone)]
pub struct AppServices {
    sync_state: SynchronizationState,
    words: WordsCache,
    widgets: Arc<WidgetService>,
    add_widget: Arc<AddWidget>,
    delete_widget: Arc<DeleteWidget>,
    synchronize_words: Arc<SynchronizeWords>,
}

impl AppServices {
    #[must_use]
    pub fn new(
        storage: &Storage,
        remote: Arc<dyn RemoteWordSource>,
        refresher: Arc<dyn WidgetRefresher>,
        clock: Clock,
    ) -> Self {
        let sync_state = SynchronizationState::new();
        let words = WordsCache::new(remote, Arc::clone(&storage.words));
        let widgets = Arc::new(WidgetService::new(
            Arc::clone(&storage.widgets),
            Arc::clone(&storage.sheets),
        ));
        let add_widget = Arc::new(AddWidget::new(
            Arc::clone(&storage.widgets),
            Arc::clone(&storage.sheets),
            words.clone(),
        ));
        let delete_widget = Arc::new(DeleteWidget::new(
            Arc::clone(&storage.widgets),
            Arc::clone(&storage.sheets),
            words.clone(),
        ));
        let synchronize_words = Arc::new(SynchronizeWords::new(
            clock,
            Arc::clone(&storage.widgets),
            Arc::clone(&storage.sheets),
            words.clone(),
            sync_state.clone(),
            refresher,
        ));

        Self {
            sync_state,
            words,
            widgets,
            add_widget,
            delete_widget,
            synchronize_words,
        }
    }

    /// Build services backed by `SQLite` storage and the sheet export endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage or the HTTP client cannot be set up.
    pub async fn new_sqlite(
        db_url: &str,
        refresher: Arc<dyn WidgetRefresher>,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let remote: Arc<dyn RemoteWordSource> = Arc::new(SheetsExportClient::from_env()?);
        Ok(Self::new(&storage, remote, refresher, clock))
    }

    #[must_use]
    pub fn sync_state(&self) -> SynchronizationState {
        self.sync_state.clone()
    }

    #[must_use]
    pub fn words(&self) -> WordsCache {
        self.words.clone()
    }

    #[must_use]
    pub fn widgets(&self) -> Arc<WidgetService> {
        Arc::clone(&self.widgets)
    }

    #[must_use]
    pub fn add_widget(&self) -> Arc<AddWidget> {
        Arc::clone(&self.add_widget)
    }

    #[must_use]
    pub fn delete_widget(&self) -> Arc<DeleteWidget> {
        Arc::clone(&self.delete_widget)
    }

    #[must_use]
    pub fn synchronize_words(&self) -> Arc<SynchronizeWords> {
        Arc::clone(&self.synchronize_words)
    }
}
