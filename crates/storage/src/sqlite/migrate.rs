use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates sheets, widgets and word pairs. Word pairs and widgets
/// cascade from their sheet; a trigger deletes a sheet once its last widget
/// row is gone.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sheets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    spreadsheet_id TEXT NOT NULL,
                    sheet_index INTEGER NOT NULL CHECK (sheet_index >= 0),
                    name TEXT NOT NULL,
                    last_synchronized_at TEXT,
                    UNIQUE (spreadsheet_id, sheet_index)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS widgets (
                    id INTEGER PRIMARY KEY,
                    sheet_id INTEGER NOT NULL,
                    FOREIGN KEY (sheet_id) REFERENCES sheets(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS word_pairs (
                    sheet_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    original TEXT NOT NULL,
                    translated TEXT NOT NULL,
                    PRIMARY KEY (sheet_id, position),
                    FOREIGN KEY (sheet_id) REFERENCES sheets(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_widgets_sheet
                    ON widgets (sheet_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TRIGGER IF NOT EXISTS delete_orphaned_sheet
                AFTER DELETE ON widgets
                WHEN NOT EXISTS (SELECT 1 FROM widgets WHERE sheet_id = OLD.sheet_id)
                BEGIN
                    DELETE FROM sheets WHERE id = OLD.sheet_id;
                END;
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
