use tokio::sync::mpsc;
use words_core::model::WidgetId;

/// Asks the host UI to redraw a widget. Fire-and-forget.
pub trait WidgetRefresher: Send + Sync {
    fn request_refresh(&self, widget_id: WidgetId);
}

/// Refresher for hosts without a UI loop; only records the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRefresher;

impl WidgetRefresher for LoggingRefresher {
    fn request_refresh(&self, widget_id: WidgetId) {
        tracing::debug!(%widget_id, "widget refresh requested");
    }
}

/// Forwards refresh requests to a host event loop.
#[derive(Debug, Clone)]
pub struct ChannelRefresher {
    tx: mpsc::UnboundedSender<WidgetId>,
}

impl ChannelRefresher {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WidgetId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl WidgetRefresher for ChannelRefresher {
    fn request_refresh(&self, widget_id: WidgetId) {
        if self.tx.send(widget_id).is_err() {
            tracing::debug!(%widget_id, "refresh receiver closed; dropping request");
        }
    }
}
