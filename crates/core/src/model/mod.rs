mod ids;
mod sheet;
mod widget;
mod word_pair;

pub use ids::{ParseIdError, SheetId, WidgetId};
pub use sheet::{NewSheet, Sheet, SheetError, SheetRemoteId};
pub use widget::Widget;
pub use word_pair::WordPair;
