use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use words_core::model::{Sheet, SheetId, SheetRemoteId, Widget, WidgetId, WordPair};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a failed write, separating constraint violations from I/O trouble.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db)
            if db.is_unique_violation() || db.is_foreign_key_violation() =>
        {
            StorageError::Conflict(db.message().to_owned())
        }
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn read_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn sheet_id_to_i64(id: SheetId) -> Result<i64, StorageError> {
    u64_to_i64("sheet_id", id.value())
}

pub(crate) fn widget_id_to_i64(id: WidgetId) -> Result<i64, StorageError> {
    u64_to_i64("widget_id", id.value())
}

pub(crate) fn sheet_id_from_i64(v: i64) -> Result<SheetId, StorageError> {
    Ok(SheetId::new(i64_to_u64("sheet_id", v)?))
}

pub(crate) fn widget_id_from_i64(v: i64) -> Result<WidgetId, StorageError> {
    Ok(WidgetId::new(i64_to_u64("widget_id", v)?))
}

pub(crate) fn map_sheet_row(row: &SqliteRow) -> Result<Sheet, StorageError> {
    let sheet_index: i64 = row.try_get("sheet_index").map_err(ser)?;
    let sheet_index = u32::try_from(sheet_index)
        .map_err(|_| StorageError::Serialization(format!("invalid sheet_index: {sheet_index}")))?;
    let remote_id = SheetRemoteId::new(
        row.try_get::<String, _>("spreadsheet_id").map_err(ser)?,
        sheet_index,
    )
    .map_err(ser)?;

    Ok(Sheet::from_persisted(
        sheet_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        remote_id,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get("last_synchronized_at").map_err(ser)?,
    ))
}

pub(crate) fn map_widget_row(row: &SqliteRow) -> Result<Widget, StorageError> {
    Ok(Widget::new(
        widget_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        sheet_id_from_i64(row.try_get::<i64, _>("sheet_id").map_err(ser)?)?,
    ))
}

pub(crate) fn map_word_row(row: &SqliteRow) -> Result<WordPair, StorageError> {
    Ok(WordPair::new(
        row.try_get::<String, _>("original").map_err(ser)?,
        row.try_get::<String, _>("translated").map_err(ser)?,
    ))
}
