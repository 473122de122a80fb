use std::sync::Arc;

use storage::observe::Observation;
use storage::repository::{StorageError, WordRepository};
use words_core::csv::parse_word_pairs;
use words_core::model::{SheetId, SheetRemoteId, WordPair};

use crate::remote::RemoteWordSource;

/// Local cache of each sheet's word pairs, refreshed from the remote source.
#[derive(Clone)]
pub struct WordsCache {
    remote: Arc<dyn RemoteWordSource>,
    words: Arc<dyn WordRepository>,
}

impl WordsCache {
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteWordSource>, words: Arc<dyn WordRepository>) -> Self {
        Self { remote, words }
    }

    /// Live word list of a sheet; empty until the first synchronization.
    #[must_use]
    pub fn observe_words(&self, sheet_id: SheetId) -> Observation<Vec<WordPair>> {
        let words = Arc::clone(&self.words);
        Observation::new(self.words.changes(), move || {
            let words = Arc::clone(&words);
            async move { words.get_words(sheet_id).await }
        })
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be read.
    pub async fn current_words(&self, sheet_id: SheetId) -> Result<Vec<WordPair>, StorageError> {
        self.words.get_words(sheet_id).await
    }

    /// Fetch a sheet and replace its cached pairs.
    ///
    /// Returns `Ok(false)` and leaves the cache untouched when the fetch
    /// fails or the sheet no longer exists. Zero remote rows is a success and
    /// empties the cache.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the fetched pairs cannot be stored.
    pub async fn synchronize_words(
        &self,
        sheet_id: SheetId,
        remote_id: &SheetRemoteId,
    ) -> Result<bool, StorageError> {
        let raw = match self.remote.fetch(remote_id).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(%sheet_id, %remote_id, error = %err, "fetching words failed");
                return Ok(false);
            }
        };

        let pairs = parse_word_pairs(&raw);
        match self.words.replace_words(sheet_id, &pairs).await {
            Ok(()) => {
                tracing::debug!(%sheet_id, count = pairs.len(), "words cache replaced");
                Ok(true)
            }
            // The sheet was deleted while the fetch was in flight.
            Err(StorageError::Conflict(_)) => {
                tracing::error!(%sheet_id, "cannot store words: sheet not found");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    pub async fn delete_words(&self, sheet_id: SheetId) -> Result<(), StorageError> {
        self.words.delete_words(sheet_id).await
    }
}
