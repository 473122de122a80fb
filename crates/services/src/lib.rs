#![forbid(unsafe_code)]

pub mod add_widget;
pub mod app_services;
pub mod delete_widget;
pub mod error;
pub mod refresh;
pub mod remote;
pub mod sync_state;
pub mod synchronize_words;
pub mod widget_service;
pub mod words_cache;

pub use words_core::Clock;

pub use add_widget::AddWidget;
pub use app_services::AppServices;
pub use delete_widget::DeleteWidget;
pub use error::{AppServicesError, RemoteError, WidgetServiceError};
pub use refresh::{ChannelRefresher, LoggingRefresher, WidgetRefresher};
pub use remote::{RemoteSourceConfig, RemoteWordSource, SheetsExportClient};
pub use sync_state::{IsSynchronizing, SynchronizationState};
pub use synchronize_words::SynchronizeWords;
pub use widget_service::WidgetService;
pub use words_cache::WordsCache;
