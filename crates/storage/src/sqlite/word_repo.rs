use tokio::sync::watch;
use words_core::model::{SheetId, WordPair};

use super::SqliteRepository;
use super::mapping::{map_word_row, read_err, ser, sheet_id_to_i64, write_err};
use crate::repository::{StorageError, WordRepository};

#[async_trait::async_trait]
impl WordRepository for SqliteRepository {
    async fn get_words(&self, sheet_id: SheetId) -> Result<Vec<WordPair>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT original, translated
            FROM word_pairs
            WHERE sheet_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(sheet_id_to_i64(sheet_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.iter().map(map_word_row).collect()
    }

    async fn replace_words(
        &self,
        sheet_id: SheetId,
        words: &[WordPair],
    ) -> Result<(), StorageError> {
        let sheet_id = sheet_id_to_i64(sheet_id)?;
        let mut tx = self.pool.begin().await.map_err(read_err)?;

        let sheet = sqlx::query("SELECT 1 FROM sheets WHERE id = ?1")
            .bind(sheet_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(read_err)?;
        if sheet.is_none() {
            return Err(StorageError::Conflict(format!(
                "sheet {sheet_id} does not exist"
            )));
        }

        sqlx::query("DELETE FROM word_pairs WHERE sheet_id = ?1")
            .bind(sheet_id)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;

        for (position, word) in words.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO word_pairs (sheet_id, position, original, translated)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(sheet_id)
            .bind(i64::try_from(position).map_err(ser)?)
            .bind(word.original.as_str())
            .bind(word.translated.as_str())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(write_err)?;
        self.feed.notify();
        Ok(())
    }

    async fn delete_words(&self, sheet_id: SheetId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM word_pairs WHERE sheet_id = ?1")
            .bind(sheet_id_to_i64(sheet_id)?)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;

        if res.rows_affected() > 0 {
            self.feed.notify();
        }
        Ok(())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.feed.subscribe()
    }
}
