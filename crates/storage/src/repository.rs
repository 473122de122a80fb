use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;
use words_core::model::{NewSheet, Sheet, SheetId, SheetRemoteId, Widget, WidgetId, WordPair};

use crate::observe::ChangeFeed;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A uniqueness or reference constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persistent CRUD for sheets.
///
/// Deleting a sheet also removes its word pairs and any widget still
/// pointing at it.
#[async_trait]
pub trait SheetRepository: Send + Sync {
    /// Fetch a sheet by its remote identity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn get_by_remote_id(&self, remote_id: &SheetRemoteId)
    -> Result<Option<Sheet>, StorageError>;

    /// Fetch a sheet by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn get_sheet(&self, id: SheetId) -> Result<Option<Sheet>, StorageError>;

    /// Insert a sheet and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a sheet with the same remote id exists.
    async fn add_sheet(&self, sheet: NewSheet) -> Result<Sheet, StorageError>;

    /// Remove a sheet and everything hanging off it. Missing ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_sheet(&self, id: SheetId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn exists(&self, id: SheetId) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the sheet is missing.
    async fn update_last_synchronized_at(
        &self,
        id: SheetId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// List sheets ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_sheets(&self) -> Result<Vec<Sheet>, StorageError>;
}

/// Persistent widget to sheet associations.
///
/// Implementations own the reference-count rule: deleting the last widget of
/// a sheet deletes that sheet and its word pairs in the same operation.
#[async_trait]
pub trait WidgetRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn get_widget(&self, id: WidgetId) -> Result<Option<Widget>, StorageError>;

    /// Associate a widget with a sheet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the widget id is taken or the
    /// sheet does not exist.
    async fn add_widget(&self, id: WidgetId, sheet_id: SheetId) -> Result<Widget, StorageError>;

    /// Remove a widget, cascading to an orphaned sheet. Missing ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_widget(&self, id: WidgetId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_widgets(&self) -> Result<Vec<Widget>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn count_widgets_for_sheet(&self, sheet_id: SheetId) -> Result<u64, StorageError>;

    /// Revision feed bumped after every committed write.
    fn changes(&self) -> watch::Receiver<u64>;
}

/// Local cache of word pairs, keyed by sheet.
#[async_trait]
pub trait WordRepository: Send + Sync {
    /// Word pairs for a sheet in row order; empty when nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_words(&self, sheet_id: SheetId) -> Result<Vec<WordPair>, StorageError>;

    /// Atomically replace every cached pair of a sheet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the sheet does not exist.
    async fn replace_words(&self, sheet_id: SheetId, words: &[WordPair])
    -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_words(&self, sheet_id: SheetId) -> Result<(), StorageError>;

    /// Revision feed bumped after every committed write.
    fn changes(&self) -> watch::Receiver<u64>;
}

#[derive(Default)]
struct MemoryState {
    next_sheet_id: u64,
    sheets: BTreeMap<SheetId, Sheet>,
    widgets: BTreeMap<WidgetId, Widget>,
    words: HashMap<SheetId, Vec<WordPair>>,
}

impl MemoryState {
    fn remove_sheet(&mut self, id: SheetId) -> bool {
        let removed = self.sheets.remove(&id).is_some();
        self.words.remove(&id);
        self.widgets.retain(|_, widget| widget.sheet_id() != id);
        removed
    }
}

/// In-memory repository enforcing the same cascade rules as the `SQLite` schema.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    feed: ChangeFeed,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl SheetRepository for InMemoryRepository {
    async fn get_by_remote_id(
        &self,
        remote_id: &SheetRemoteId,
    ) -> Result<Option<Sheet>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .sheets
            .values()
            .find(|sheet| sheet.remote_id() == remote_id)
            .cloned())
    }

    async fn get_sheet(&self, id: SheetId) -> Result<Option<Sheet>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.sheets.get(&id).cloned())
    }

    async fn add_sheet(&self, sheet: NewSheet) -> Result<Sheet, StorageError> {
        let stored = {
            let mut guard = self.lock()?;
            if guard
                .sheets
                .values()
                .any(|existing| existing.remote_id() == sheet.remote_id())
            {
                return Err(StorageError::Conflict(format!(
                    "sheet {} already exists",
                    sheet.remote_id()
                )));
            }
            guard.next_sheet_id += 1;
            let stored = sheet.into_sheet(SheetId::new(guard.next_sheet_id));
            guard.sheets.insert(stored.id(), stored.clone());
            stored
        };
        self.feed.notify();
        Ok(stored)
    }

    async fn delete_sheet(&self, id: SheetId) -> Result<(), StorageError> {
        let removed = self.lock()?.remove_sheet(id);
        if removed {
            self.feed.notify();
        }
        Ok(())
    }

    async fn exists(&self, id: SheetId) -> Result<bool, StorageError> {
        Ok(self.lock()?.sheets.contains_key(&id))
    }

    async fn update_last_synchronized_at(
        &self,
        id: SheetId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        {
            let mut guard = self.lock()?;
            let sheet = guard.sheets.get_mut(&id).ok_or(StorageError::NotFound)?;
            sheet.mark_synchronized(at);
        }
        self.feed.notify();
        Ok(())
    }

    async fn list_sheets(&self) -> Result<Vec<Sheet>, StorageError> {
        Ok(self.lock()?.sheets.values().cloned().collect())
    }
}

#[async_trait]
impl WidgetRepository for InMemoryRepository {
    async fn get_widget(&self, id: WidgetId) -> Result<Option<Widget>, StorageError> {
        Ok(self.lock()?.widgets.get(&id).copied())
    }

    async fn add_widget(&self, id: WidgetId, sheet_id: SheetId) -> Result<Widget, StorageError> {
        let widget = {
            let mut guard = self.lock()?;
            if guard.widgets.contains_key(&id) {
                return Err(StorageError::Conflict(format!("widget {id} already exists")));
            }
            if !guard.sheets.contains_key(&sheet_id) {
                return Err(StorageError::Conflict(format!("sheet {sheet_id} does not exist")));
            }
            let widget = Widget::new(id, sheet_id);
            guard.widgets.insert(id, widget);
            widget
        };
        self.feed.notify();
        Ok(widget)
    }

    async fn delete_widget(&self, id: WidgetId) -> Result<(), StorageError> {
        let removed = {
            let mut guard = self.lock()?;
            match guard.widgets.remove(&id) {
                Some(widget) => {
                    let sheet_id = widget.sheet_id();
                    let still_referenced =
                        guard.widgets.values().any(|w| w.sheet_id() == sheet_id);
                    if !still_referenced {
                        guard.remove_sheet(sheet_id);
                    }
                    true
                }
                None => false,
            }
        };
        if removed {
            self.feed.notify();
        }
        Ok(())
    }

    async fn list_widgets(&self) -> Result<Vec<Widget>, StorageError> {
        Ok(self.lock()?.widgets.values().copied().collect())
    }

    async fn count_widgets_for_sheet(&self, sheet_id: SheetId) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        let count = guard
            .widgets
            .values()
            .filter(|w| w.sheet_id() == sheet_id)
            .count();
        Ok(count as u64)
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.feed.subscribe()
    }
}

#[async_trait]
impl WordRepository for InMemoryRepository {
    async fn get_words(&self, sheet_id: SheetId) -> Result<Vec<WordPair>, StorageError> {
        Ok(self
            .lock()?
            .words
            .get(&sheet_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_words(
        &self,
        sheet_id: SheetId,
        words: &[WordPair],
    ) -> Result<(), StorageError> {
        {
            let mut guard = self.lock()?;
            if !guard.sheets.contains_key(&sheet_id) {
                return Err(StorageError::Conflict(format!("sheet {sheet_id} does not exist")));
            }
            guard.words.insert(sheet_id, words.to_vec());
        }
        self.feed.notify();
        Ok(())
    }

    async fn delete_words(&self, sheet_id: SheetId) -> Result<(), StorageError> {
        let removed = self.lock()?.words.remove(&sheet_id).is_some();
        if removed {
            self.feed.notify();
        }
        Ok(())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.feed.subscribe()
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sheets: Arc<dyn SheetRepository>,
    pub widgets: Arc<dyn WidgetRepository>,
    pub words: Arc<dyn WordRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sheets: Arc<dyn SheetRepository> = Arc::new(repo.clone());
        let widgets: Arc<dyn WidgetRepository> = Arc::new(repo.clone());
        let words: Arc<dyn WordRepository> = Arc::new(repo);
        Self {
            sheets,
            widgets,
            words,
        }
    }
}
