use chrono::{DateTime, Utc};
use words_core::model::{NewSheet, Sheet, SheetId, SheetRemoteId};

use super::SqliteRepository;
use super::mapping::{map_sheet_row, read_err, sheet_id_from_i64, sheet_id_to_i64, write_err};
use crate::repository::{SheetRepository, StorageError};

#[async_trait::async_trait]
impl SheetRepository for SqliteRepository {
    async fn get_by_remote_id(
        &self,
        remote_id: &SheetRemoteId,
    ) -> Result<Option<Sheet>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, spreadsheet_id, sheet_index, name, last_synchronized_at
            FROM sheets WHERE spreadsheet_id = ?1 AND sheet_index = ?2
            ",
        )
        .bind(remote_id.spreadsheet_id())
        .bind(i64::from(remote_id.sheet_index()))
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.as_ref().map(map_sheet_row).transpose()
    }

    async fn get_sheet(&self, id: SheetId) -> Result<Option<Sheet>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, spreadsheet_id, sheet_index, name, last_synchronized_at
            FROM sheets WHERE id = ?1
            ",
        )
        .bind(sheet_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.as_ref().map(map_sheet_row).transpose()
    }

    async fn add_sheet(&self, sheet: NewSheet) -> Result<Sheet, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO sheets (spreadsheet_id, sheet_index, name, last_synchronized_at)
            VALUES (?1, ?2, ?3, NULL)
            ",
        )
        .bind(sheet.remote_id().spreadsheet_id())
        .bind(i64::from(sheet.remote_id().sheet_index()))
        .bind(sheet.name())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        let id = sheet_id_from_i64(res.last_insert_rowid())?;
        self.feed.notify();
        Ok(sheet.into_sheet(id))
    }

    async fn delete_sheet(&self, id: SheetId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM sheets WHERE id = ?1")
            .bind(sheet_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;

        if res.rows_affected() > 0 {
            self.feed.notify();
        }
        Ok(())
    }

    async fn exists(&self, id: SheetId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM sheets WHERE id = ?1")
            .bind(sheet_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;
        Ok(row.is_some())
    }

    async fn update_last_synchronized_at(
        &self,
        id: SheetId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE sheets SET last_synchronized_at = ?1 WHERE id = ?2")
            .bind(at)
            .bind(sheet_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        self.feed.notify();
        Ok(())
    }

    async fn list_sheets(&self) -> Result<Vec<Sheet>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, spreadsheet_id, sheet_index, name, last_synchronized_at
            FROM sheets
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.iter().map(map_sheet_row).collect()
    }
}
