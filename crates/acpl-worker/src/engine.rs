//! UCI engine wrapper (async I/O over the subprocess pipes).
//!
//! One `UciEngine` owns exactly one engine process for its whole lifetime;
//! a pool slot acquires it at startup and releases it at shutdown or when
//! recycling after a fatal protocol failure.

use std::future::Future;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::error::WorkerError;

/// Evaluation seam between the analysis loop and the engine process, so
/// the loop can be driven without a live subprocess.
pub trait Evaluator {
    fn name(&self) -> &str;

    fn evaluate(
        &mut self,
        fen: &str,
        movetime_ms: u64,
    ) -> impl Future<Output = Result<RawEval, WorkerError>> + Send;
}

/// Raw score of a single position evaluation, from the side to move's
/// perspective. Exactly one of `cp`/`mate` is set when the engine reported
/// a score; both are `None` if it printed `bestmove` without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawEval {
    pub cp: Option<i32>,
    pub mate: Option<i32>,
}

pub struct UciEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    name: String,
}

impl UciEngine {
    /// Spawn an engine process and run the UCI handshake.
    pub async fn spawn(path: &Path, hash_mb: u32) -> Result<Self, WorkerError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| WorkerError::Engine(format!("failed to spawn engine: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| WorkerError::Engine("engine stdin not captured".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| WorkerError::Engine("engine stdout not captured".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            name: String::new(),
        };

        engine.send("uci").await?;
        loop {
            let line = engine.read_line().await?;
            if let Some(name) = line.strip_prefix("id name ") {
                engine.name = name.trim().to_string();
            }
            if line == "uciok" {
                break;
            }
        }
        if engine.name.is_empty() {
            engine.name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown".to_string());
        }

        engine.send("setoption name Threads value 1").await?;
        engine
            .send(&format!("setoption name Hash value {hash_mb}"))
            .await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    /// Engine identifier from the `id name` handshake line.
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn send(&mut self, cmd: &str) -> Result<(), WorkerError> {
        debug!(cmd, "engine <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| WorkerError::Engine(format!("failed to write to engine: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| WorkerError::Engine(format!("failed to flush engine stdin: {e}")))?;
        Ok(())
    }

    /// Read one line; EOF means the process died under us.
    async fn read_line(&mut self) -> Result<String, WorkerError> {
        let mut line = String::new();
        let n = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| WorkerError::Engine(format!("failed to read from engine: {e}")))?;
        if n == 0 {
            return Err(WorkerError::EngineTerminated);
        }
        let trimmed = line.trim();
        debug!(line = trimmed, "engine >");
        Ok(trimmed.to_string())
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), WorkerError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }

    /// Evaluate one position under a fixed wall-clock budget. Returns the
    /// last score the engine reported before `bestmove`.
    pub async fn evaluate(&mut self, fen: &str, movetime_ms: u64) -> Result<RawEval, WorkerError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go movetime {movetime_ms}")).await?;

        let mut eval = RawEval::default();
        loop {
            let line = self.read_line().await?;
            if line.starts_with("info") && line.contains(" score ") {
                if let Some(cp) = parse_cp(&line) {
                    eval.cp = Some(cp);
                    eval.mate = None;
                }
                if let Some(mate) = parse_mate(&line) {
                    eval.mate = Some(mate);
                    eval.cp = None;
                }
            } else if line.starts_with("bestmove") {
                return Ok(eval);
            }
        }
    }

    /// Graceful shutdown: ask the process to quit and reap it.
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl Evaluator for UciEngine {
    fn name(&self) -> &str {
        UciEngine::name(self)
    }

    async fn evaluate(&mut self, fen: &str, movetime_ms: u64) -> Result<RawEval, WorkerError> {
        UciEngine::evaluate(self, fen, movetime_ms).await
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill so no engine process outlives the pool.
        let _ = self.process.start_kill();
    }
}

/// Parse `score cp N` from an info line.
fn parse_cp(line: &str) -> Option<i32> {
    parse_after(line, "cp")
}

/// Parse `score mate N` from an info line.
fn parse_mate(line: &str) -> Option<i32> {
    parse_after(line, "mate")
}

fn parse_after(line: &str, keyword: &str) -> Option<i32> {
    let mut parts = line.split_whitespace();
    while let Some(part) = parts.next() {
        if part == keyword {
            return parts.next()?.parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cp_score() {
        let line = "info depth 12 seldepth 18 multipv 1 score cp 35 nodes 100000 pv e2e4";
        assert_eq!(parse_cp(line), Some(35));
        assert_eq!(parse_mate(line), None);
    }

    #[test]
    fn parses_mate_score() {
        let line = "info depth 20 score mate -3 nodes 100000 pv e2e4";
        assert_eq!(parse_mate(line), Some(-3));
        assert_eq!(parse_cp(line), None);
    }

    #[test]
    fn missing_score_is_none() {
        assert_eq!(parse_cp("info depth 1 currmove e2e4"), None);
        assert_eq!(parse_mate("bestmove e2e4"), None);
    }
}
