//! Change notification for repositories.
//!
//! Repositories bump a revision counter after every committed write. An
//! [`Observation`] re-runs its query on each bump and yields the result only
//! when it differs from the last value it handed out.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::repository::StorageError;

/// Revision counter shared by all observers of one repository.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Record that a write has been committed.
    pub fn notify(&self) {
        self.tx.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

type Loader<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, StorageError>> + Send + Sync>;

/// A live query over a repository.
///
/// The first call to [`Observation::next`] yields the current value. Later
/// calls wait for a write and yield only distinct values. `None` means the
/// repository is gone.
pub struct Observation<T> {
    changes: watch::Receiver<u64>,
    load: Loader<T>,
    last: Option<T>,
}

impl<T> Observation<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn new<F, Fut>(changes: watch::Receiver<u64>, load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, StorageError>> + Send + 'static,
    {
        Self {
            changes,
            load: Arc::new(move || load().boxed()),
            last: None,
        }
    }

    /// Wait for the next distinct value.
    pub async fn next(&mut self) -> Option<Result<T, StorageError>> {
        if self.last.is_none() {
            self.changes.borrow_and_update();
            return Some(self.reload().await);
        }

        loop {
            if self.changes.changed().await.is_err() {
                return None;
            }
            self.changes.borrow_and_update();
            match (self.load)().await {
                Ok(value) if self.last.as_ref() == Some(&value) => {}
                Ok(value) => {
                    self.last = Some(value.clone());
                    return Some(Ok(value));
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }

    /// The most recent value handed out, if any.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.last.as_ref()
    }

    async fn reload(&mut self) -> Result<T, StorageError> {
        let value = (self.load)().await?;
        self.last = Some(value.clone());
        Ok(value)
    }
}
