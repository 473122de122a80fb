use tokio::sync::watch;
use words_core::model::{SheetId, Widget, WidgetId};

use super::SqliteRepository;
use super::mapping::{map_widget_row, read_err, ser, sheet_id_to_i64, widget_id_to_i64, write_err};
use crate::repository::{StorageError, WidgetRepository};

#[async_trait::async_trait]
impl WidgetRepository for SqliteRepository {
    async fn get_widget(&self, id: WidgetId) -> Result<Option<Widget>, StorageError> {
        let row = sqlx::query("SELECT id, sheet_id FROM widgets WHERE id = ?1")
            .bind(widget_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;

        row.as_ref().map(map_widget_row).transpose()
    }

    async fn add_widget(&self, id: WidgetId, sheet_id: SheetId) -> Result<Widget, StorageError> {
        sqlx::query("INSERT INTO widgets (id, sheet_id) VALUES (?1, ?2)")
            .bind(widget_id_to_i64(id)?)
            .bind(sheet_id_to_i64(sheet_id)?)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;

        self.feed.notify();
        Ok(Widget::new(id, sheet_id))
    }

    async fn delete_widget(&self, id: WidgetId) -> Result<(), StorageError> {
        // The delete_orphaned_sheet trigger removes the sheet when this was its
        // last widget; word pairs follow through the foreign key.
        let res = sqlx::query("DELETE FROM widgets WHERE id = ?1")
            .bind(widget_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;

        if res.rows_affected() > 0 {
            self.feed.notify();
        }
        Ok(())
    }

    async fn list_widgets(&self) -> Result<Vec<Widget>, StorageError> {
        let rows = sqlx::query("SELECT id, sheet_id FROM widgets ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(read_err)?;

        rows.iter().map(map_widget_row).collect()
    }

    async fn count_widgets_for_sheet(&self, sheet_id: SheetId) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM widgets WHERE sheet_id = ?1")
            .bind(sheet_id_to_i64(sheet_id)?)
            .fetch_one(&self.pool)
            .await
            .map_err(read_err)?;
        u64::try_from(count).map_err(ser)
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.feed.subscribe()
    }
}
