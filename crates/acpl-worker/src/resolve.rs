//! Identity resolution: match an ingested game record to the stored game
//! it corresponds to. Read-only with respect to players/games/moves.

use pgn_core::game_data::GameRecord;
use sqlx::SqlitePool;
use tracing::warn;

use crate::db;
use crate::error::WorkerError;

/// How many leading moves the ambiguity probe compares.
pub const PROBE_PLIES: usize = 10;

/// Normalize a PGN date tag to ISO `YYYY-MM-DD`.
///
/// Wildcard month/day (`??`) map to 1; a missing, fully unknown, or
/// unparseable date maps to `None` — never an error.
pub fn normalize_pgn_date(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() || raw.starts_with('?') {
        return None;
    }
    let mut parts = raw.split('.');
    let year: u32 = parts.next()?.parse().ok()?;
    let month = wildcard_field(parts.next())?;
    let day = wildcard_field(parts.next())?;
    Some(format!("{year:04}-{month:02}-{day:02}"))
}

fn wildcard_field(part: Option<&str>) -> Option<u32> {
    let part = part?;
    if part == "??" {
        Some(1)
    } else {
        part.parse().ok()
    }
}

/// Find the stored game id for an ingested record. `Ok(None)` is the
/// not-found outcome: a missing player, no candidate, or an empty record.
pub async fn resolve_game(
    pool: &SqlitePool,
    record: &GameRecord,
) -> Result<Option<i64>, WorkerError> {
    let white = record.tag("White").unwrap_or("Unknown").trim();
    let black = record.tag("Black").unwrap_or("Unknown").trim();
    let result = record.tag("Result").unwrap_or("*");
    let date = normalize_pgn_date(record.tag("Date"));
    let ply_count = record.ply_count() as i64;

    let Some(white_id) = db::player_id(pool, white).await? else {
        return Ok(None);
    };
    let Some(black_id) = db::player_id(pool, black).await? else {
        return Ok(None);
    };

    let candidates =
        db::candidate_game_ids(pool, white_id, black_id, result, date.as_deref(), ply_count)
            .await?;

    match candidates.len() {
        0 => Ok(None),
        1 => Ok(Some(candidates[0])),
        n => {
            // Same pairing/result/date/length can repeat (rematches);
            // disambiguate on the opening move prefix.
            let probe = &record.moves[..record.moves.len().min(PROBE_PLIES)];
            for &game_id in &candidates {
                let stored = db::move_prefix(pool, game_id, probe.len() as i64).await?;
                if stored == probe {
                    return Ok(Some(game_id));
                }
            }
            // Best-effort fallback: candidates are ordered by id, take the
            // lowest. Not a guaranteed-correct match.
            warn!(
                candidates = n,
                game_id = candidates[0],
                "no move-prefix match among candidates; falling back to lowest id"
            );
            Ok(Some(candidates[0]))
        }
    }
}
