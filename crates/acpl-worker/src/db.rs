//! SQLite access: resolver lookups (read-only) and the `analysis` result
//! store (insert-or-update keyed on game id).

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::error::WorkerError;

/// One result row per game identity; the natural key is `game_id`.
#[derive(Debug, Clone)]
pub struct AnalysisRow {
    pub game_id: i64,
    pub plies_analyzed: i64,
    pub acpl_white: f64,
    pub acpl_black: f64,
    pub accuracy_white: f64,
    pub accuracy_black: f64,
    pub ms_total: i64,
    pub engine: String,
    pub movetime_ms: i64,
    pub skipped_plies: i64,
    pub notes: Option<String>,
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS analysis (
  game_id         INTEGER PRIMARY KEY,
  plies_analyzed  INTEGER NOT NULL,
  acpl_white      REAL NOT NULL,
  acpl_black      REAL NOT NULL,
  accuracy_white  REAL NOT NULL,
  accuracy_black  REAL NOT NULL,
  ms_total        INTEGER NOT NULL,
  engine          TEXT,
  movetime_ms     INTEGER,
  skipped_plies   INTEGER,
  notes           TEXT,
  FOREIGN KEY(game_id) REFERENCES games(id) ON DELETE CASCADE
)
"#;

const UPSERT_SQL: &str = r#"
INSERT INTO analysis
  (game_id, plies_analyzed, acpl_white, acpl_black, accuracy_white, accuracy_black,
   ms_total, engine, movetime_ms, skipped_plies, notes)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(game_id) DO UPDATE SET
  plies_analyzed = excluded.plies_analyzed,
  acpl_white = excluded.acpl_white,
  acpl_black = excluded.acpl_black,
  accuracy_white = excluded.accuracy_white,
  accuracy_black = excluded.accuracy_black,
  ms_total = excluded.ms_total,
  engine = excluded.engine,
  movetime_ms = excluded.movetime_ms,
  skipped_plies = excluded.skipped_plies,
  notes = excluded.notes
"#;

/// Open the store with foreign keys enforced and WAL journaling. The file
/// must already exist; it is the same database that holds the games.
pub async fn connect(path: &Path) -> Result<SqlitePool, WorkerError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);
    Ok(SqlitePool::connect_with(options).await?)
}

pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), WorkerError> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

/// Upsert a batch of result rows inside one transaction. All-or-nothing: a
/// constraint violation rolls back the whole batch.
pub async fn upsert_analysis_batch(
    pool: &SqlitePool,
    rows: &[AnalysisRow],
) -> Result<(), WorkerError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(UPSERT_SQL)
            .bind(row.game_id)
            .bind(row.plies_analyzed)
            .bind(row.acpl_white)
            .bind(row.acpl_black)
            .bind(row.accuracy_white)
            .bind(row.accuracy_black)
            .bind(row.ms_total)
            .bind(&row.engine)
            .bind(row.movetime_ms)
            .bind(row.skipped_plies)
            .bind(&row.notes)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Look up a player id by exact name. Read-only: this subsystem never
/// creates player records.
pub async fn player_id(pool: &SqlitePool, name: &str) -> Result<Option<i64>, WorkerError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM players WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.0))
}

/// Games matching the candidate key, ordered by id so the ambiguity
/// fallback is deterministic. A null date matches stored null/empty dates
/// rather than using SQL null equality.
pub async fn candidate_game_ids(
    pool: &SqlitePool,
    white_id: i64,
    black_id: i64,
    result: &str,
    date: Option<&str>,
    ply_count: i64,
) -> Result<Vec<i64>, WorkerError> {
    let rows: Vec<(i64,)> = match date {
        Some(date) => {
            sqlx::query_as(
                "SELECT id FROM games
                 WHERE white_id = ? AND black_id = ? AND result = ? AND date = ? AND ply_count = ?
                 ORDER BY id",
            )
            .bind(white_id)
            .bind(black_id)
            .bind(result)
            .bind(date)
            .bind(ply_count)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT id FROM games
                 WHERE white_id = ? AND black_id = ? AND result = ?
                   AND (date IS NULL OR date = '') AND ply_count = ?
                 ORDER BY id",
            )
            .bind(white_id)
            .bind(black_id)
            .bind(result)
            .bind(ply_count)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// First `limit` stored UCI moves of a game, in ply order.
pub async fn move_prefix(
    pool: &SqlitePool,
    game_id: i64,
    limit: i64,
) -> Result<Vec<String>, WorkerError> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT uci FROM moves WHERE game_id = ? ORDER BY ply LIMIT ?")
            .bind(game_id)
            .bind(limit)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    async fn count_rows(pool: &SqlitePool) -> i64 {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM analysis")
            .fetch_one(pool)
            .await
            .expect("count");
        row.0
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_overwrites() {
        let pool = memory_store().await;
        insert_player(&pool, 1, "Alice").await;
        insert_player(&pool, 2, "Bob").await;
        insert_game(&pool, 7, 1, 2, "1-0", Some("2020-05-01"), &["e2e4", "e7e5"]).await;

        let mut row = sample_row(7);
        upsert_analysis_batch(&pool, std::slice::from_ref(&row))
            .await
            .expect("first write");

        row.acpl_white = 10.0;
        row.notes = Some("re-run".to_string());
        upsert_analysis_batch(&pool, std::slice::from_ref(&row))
            .await
            .expect("second write");

        assert_eq!(count_rows(&pool).await, 1);
        let stored: (f64, Option<String>) =
            sqlx::query_as("SELECT acpl_white, notes FROM analysis WHERE game_id = 7")
                .fetch_one(&pool)
                .await
                .expect("fetch");
        assert_eq!(stored.0, 10.0);
        assert_eq!(stored.1.as_deref(), Some("re-run"));
    }

    #[tokio::test]
    async fn foreign_key_violation_rolls_back_whole_batch() {
        let pool = memory_store().await;
        insert_player(&pool, 1, "Alice").await;
        insert_player(&pool, 2, "Bob").await;
        insert_game(&pool, 1, 1, 2, "1-0", None, &["e2e4"]).await;

        // Second row references a game that does not exist.
        let rows = vec![sample_row(1), sample_row(999)];
        let err = upsert_analysis_batch(&pool, &rows).await;
        assert!(err.is_err());
        assert_eq!(count_rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn deleting_the_game_cascades_to_analysis() {
        let pool = memory_store().await;
        insert_player(&pool, 1, "Alice").await;
        insert_player(&pool, 2, "Bob").await;
        insert_game(&pool, 3, 1, 2, "0-1", None, &["d2d4"]).await;
        upsert_analysis_batch(&pool, &[sample_row(3)])
            .await
            .expect("write");

        sqlx::query("DELETE FROM moves WHERE game_id = 3")
            .execute(&pool)
            .await
            .expect("clear moves");
        sqlx::query("DELETE FROM games WHERE id = 3")
            .execute(&pool)
            .await
            .expect("delete game");
        assert_eq!(count_rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn lookups_read_the_sibling_tables() {
        let pool = memory_store().await;
        insert_player(&pool, 1, "Alice").await;
        insert_player(&pool, 2, "Bob").await;
        insert_game(&pool, 5, 1, 2, "1-0", None, &["e2e4", "e7e5", "g1f3"]).await;

        assert_eq!(player_id(&pool, "Alice").await.expect("query"), Some(1));
        assert_eq!(player_id(&pool, "Nobody").await.expect("query"), None);

        let candidates = candidate_game_ids(&pool, 1, 2, "1-0", None, 3)
            .await
            .expect("query");
        assert_eq!(candidates, vec![5]);

        let prefix = move_prefix(&pool, 5, 2).await.expect("query");
        assert_eq!(prefix, vec!["e2e4", "e7e5"]);
    }
}
