//! Per-game analysis loop: replay the move list, evaluate around every
//! scored ply, and fold the losses into one result row.

use std::time::Instant;

use chess::{Board, Color};
use pgn_core::san;

use crate::config::RunConfig;
use crate::db::AnalysisRow;
use crate::engine::Evaluator;
use crate::error::WorkerError;
use crate::score::{mover_score, LossTally};

/// A resolved unit of work. Immutable once built; owned by the orchestrator
/// until dispatch, then by one worker for the duration of the analysis.
#[derive(Debug, Clone)]
pub struct Job {
    pub game_id: i64,
    pub moves: Vec<String>,
}

pub struct JobOutcome {
    pub row: AnalysisRow,
    /// The engine process died mid-job; the pool must recycle the handle.
    pub engine_lost: bool,
}

/// Analyze one game. Never fails the job: engine or move trouble stops the
/// loop at the last fully-scored ply and is recorded in the row's notes.
pub async fn analyze_job<E: Evaluator>(engine: &mut E, job: &Job, config: &RunConfig) -> JobOutcome {
    let started = Instant::now();
    let mut board = Board::default();
    let mut tally = LossTally::default();
    let mut notes: Vec<String> = Vec::new();
    let mut engine_lost = false;

    for (idx, uci) in job.moves.iter().enumerate() {
        let ply = (idx + 1) as u32;

        if ply <= config.skip_plies {
            // Skipped plies are still played to keep the position correct.
            match san::uci_to_move(&board, uci) {
                Some(m) => {
                    board = board.make_move_new(m);
                    continue;
                }
                None => {
                    notes.push(format!("illegal move {uci} at ply {ply}"));
                    break;
                }
            }
        }

        if let Some(max_plies) = config.max_plies {
            if ply > max_plies {
                break;
            }
        }

        let white_moved = board.side_to_move() == Color::White;

        let best = match engine.evaluate(&board.to_string(), config.movetime_ms).await {
            Ok(eval) => mover_score(&eval),
            Err(e) => {
                record_engine_failure(&mut notes, &e, &mut engine_lost);
                break;
            }
        };

        let Some(m) = san::uci_to_move(&board, uci) else {
            notes.push(format!("illegal move {uci} at ply {ply}"));
            break;
        };
        board = board.make_move_new(m);

        let after_opponent = match engine.evaluate(&board.to_string(), config.movetime_ms).await {
            Ok(eval) => mover_score(&eval),
            Err(e) => {
                record_engine_failure(&mut notes, &e, &mut engine_lost);
                break;
            }
        };

        // Re-express the post-move score from the mover's perspective.
        tally.record(white_moved, best, -after_opponent);
    }

    let row = finish_row(
        job.game_id,
        &tally,
        notes,
        started.elapsed().as_millis() as i64,
        engine.name(),
        config,
    );
    JobOutcome { row, engine_lost }
}

fn record_engine_failure(notes: &mut Vec<String>, err: &WorkerError, engine_lost: &mut bool) {
    if matches!(err, WorkerError::EngineTerminated) {
        *engine_lost = true;
    }
    notes.push(err.to_string());
}

fn finish_row(
    game_id: i64,
    tally: &LossTally,
    notes: Vec<String>,
    ms_total: i64,
    engine_name: &str,
    config: &RunConfig,
) -> AnalysisRow {
    AnalysisRow {
        game_id,
        plies_analyzed: i64::from(tally.plies()),
        acpl_white: tally.acpl_white(),
        acpl_black: tally.acpl_black(),
        accuracy_white: tally.accuracy_white(),
        accuracy_black: tally.accuracy_black(),
        ms_total,
        engine: engine_name.to_string(),
        movetime_ms: config.movetime_ms as i64,
        skipped_plies: i64::from(config.skip_plies),
        notes: if notes.is_empty() {
            None
        } else {
            Some(notes.join("; "))
        },
    }
}
