//! Tracks which widgets are in the middle of a words synchronization.
//!
//! The state lives only in memory. A widget counts as synchronizing while at
//! least one action wrapped by [`SynchronizationState::notify_for_action`] is
//! in flight for it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use words_core::model::WidgetId;

type ActiveSet = HashMap<WidgetId, usize>;

#[derive(Clone)]
pub struct SynchronizationState {
    active: Arc<watch::Sender<ActiveSet>>,
}

impl Default for SynchronizationState {
    fn default() -> Self {
        Self::new()
    }
}

impl SynchronizationState {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ActiveSet::new());
        Self {
            active: Arc::new(tx),
        }
    }

    #[must_use]
    pub fn is_synchronizing(&self, widget_id: WidgetId) -> bool {
        self.active.borrow().contains_key(&widget_id)
    }

    /// Live view of one widget's flag.
    #[must_use]
    pub fn observe_is_synchronizing(&self, widget_id: WidgetId) -> IsSynchronizing {
        IsSynchronizing {
            rx: self.active.subscribe(),
            widget_id,
            last: None,
        }
    }

    /// Run `action` with `widget_id` marked as synchronizing.
    ///
    /// The widget is marked before `action` is first polled and unmarked when
    /// it finishes, fails, panics or is dropped.
    pub async fn notify_for_action<F, T>(&self, widget_id: WidgetId, action: F) -> T
    where
        F: Future<Output = T>,
    {
        let _entry = ActiveEntry::enter(Arc::clone(&self.active), widget_id);
        action.await
    }
}

struct ActiveEntry {
    active: Arc<watch::Sender<ActiveSet>>,
    widget_id: WidgetId,
}

impl ActiveEntry {
    fn enter(active: Arc<watch::Sender<ActiveSet>>, widget_id: WidgetId) -> Self {
        active.send_modify(|set| *set.entry(widget_id).or_insert(0) += 1);
        Self { active, widget_id }
    }
}

impl Drop for ActiveEntry {
    fn drop(&mut self) {
        let widget_id = self.widget_id;
        self.active.send_modify(|set| {
            if let Some(count) = set.get_mut(&widget_id) {
                *count -= 1;
                if *count == 0 {
                    set.remove(&widget_id);
                }
            }
        });
    }
}

/// Distinct-until-changed stream of one widget's synchronizing flag.
pub struct IsSynchronizing {
    rx: watch::Receiver<ActiveSet>,
    widget_id: WidgetId,
    last: Option<bool>,
}

impl IsSynchronizing {
    #[must_use]
    pub fn current(&self) -> bool {
        self.rx.borrow().contains_key(&self.widget_id)
    }

    /// Yields the current flag on the first call, then every change.
    ///
    /// Updates are conflated: only the latest value is seen when this is
    /// polled, so an action that completes without suspending may never
    /// surface `true`.
    ///
    /// Returns `None` once the owning `SynchronizationState` is gone.
    pub async fn next(&mut self) -> Option<bool> {
        if self.last.is_none() {
            let value = self.rx.borrow_and_update().contains_key(&self.widget_id);
            self.last = Some(value);
            return Some(value);
        }

        loop {
            self.rx.changed().await.ok()?;
            let value = self.rx.borrow_and_update().contains_key(&self.widget_id);
            if self.last != Some(value) {
                self.last = Some(value);
                return Some(value);
            }
        }
    }
}
