//! Run configuration — a flat set of options parsed from the command line.

use std::path::PathBuf;

use clap::Parser;

use crate::error::WorkerError;

#[derive(Parser, Debug, Clone)]
#[command(author, version)]
#[command(about = "Scores PGN games with a UCI engine and upserts ACPL/accuracy per game.")]
pub struct RunConfig {
    /// Path to the PGN file to analyze.
    #[arg(long)]
    pub pgn: PathBuf,

    /// Path to the SQLite database holding the players/games/moves tables.
    #[arg(long)]
    pub db: PathBuf,

    /// Path to the UCI engine binary.
    #[arg(long)]
    pub engine: PathBuf,

    /// Worker pool size. Defaults to half the available cores.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Wall-clock budget per position evaluation, in milliseconds.
    #[arg(long, default_value_t = 20)]
    pub movetime_ms: u64,

    /// Leading plies to play without scoring, to avoid penalizing opening theory.
    #[arg(long, default_value_t = 0)]
    pub skip_plies: u32,

    /// Stop scoring a game after this many plies.
    #[arg(long)]
    pub max_plies: Option<u32>,

    /// Transposition table size per engine process, in MiB.
    #[arg(long, default_value_t = 256)]
    pub hash_mb: u32,

    /// Result rows per persistence transaction.
    #[arg(long, default_value_t = 400)]
    pub batch_size: usize,
}

impl RunConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| (num_cpus::get() / 2).max(1))
    }

    /// Every external resource must exist before any job executes.
    pub fn validate(&self) -> Result<(), WorkerError> {
        let required = [
            ("engine binary", &self.engine),
            ("PGN file", &self.pgn),
            ("database", &self.db),
        ];
        for (what, path) in required {
            if !path.exists() {
                return Err(WorkerError::Config(format!(
                    "{what} not found at {}",
                    path.display()
                )));
            }
        }
        if self.movetime_ms == 0 {
            return Err(WorkerError::Config("movetime must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(WorkerError::Config("batch size must be positive".into()));
        }
        Ok(())
    }
}
