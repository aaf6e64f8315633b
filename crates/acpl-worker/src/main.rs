//! ACPL analysis worker
//!
//! Scans a PGN corpus, resolves each game to its stored identity in the
//! SQLite database, scores every resolved game against a pool of UCI
//! engine processes, and upserts one analysis row per game id.
//!
//! Safe to re-run: persistence is an upsert keyed on game id, so a partial
//! or failed run converges to the same end state on the next run.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::{info, warn};

use acpl_worker::analyzer::Job;
use acpl_worker::config::RunConfig;
use acpl_worker::{db, pool, resolve};
use pgn_core::pgn::PgnScanner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = RunConfig::parse();
    config.validate()?;
    let config = Arc::new(config);

    info!(
        pgn = %config.pgn.display(),
        db = %config.db.display(),
        engine = %config.engine.display(),
        workers = config.worker_count(),
        movetime_ms = config.movetime_ms,
        skip_plies = config.skip_plies,
        max_plies = config.max_plies,
        "starting run"
    );

    let store = db::connect(&config.db).await?;
    db::ensure_schema(&store).await?;

    // Scan and resolve up front; unresolved games are a normal outcome,
    // excluded from the job set rather than treated as errors.
    let scanner = PgnScanner::open(&config.pgn)?;
    let mut jobs: Vec<Job> = Vec::new();
    let mut scanned = 0usize;
    let mut unresolved = 0usize;
    for record in scanner {
        scanned += 1;
        if record.moves.is_empty() {
            unresolved += 1;
            continue;
        }
        match resolve::resolve_game(&store, &record).await? {
            Some(game_id) => jobs.push(Job {
                game_id,
                moves: record.moves,
            }),
            None => unresolved += 1,
        }
    }
    info!(scanned, resolved = jobs.len(), unresolved, "scan complete");

    if jobs.is_empty() {
        warn!("no analyzable, resolvable games found; nothing to do");
        return Ok(());
    }

    let started = Instant::now();
    let mut rows = pool::run_pool(Arc::clone(&config), jobs).await?;

    // Completion order is unordered; sort so writes are deterministic for
    // a given job set, then flush in bounded transactions.
    rows.sort_by_key(|row| row.game_id);
    let faulted = rows.iter().filter(|row| row.notes.is_some()).count();
    for chunk in rows.chunks(config.batch_size) {
        db::upsert_analysis_batch(&store, chunk).await?;
    }

    info!(
        analyzed = rows.len(),
        faulted,
        unresolved,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run complete"
    );
    Ok(())
}
