//! Worker pool: a fixed set of tasks, each owning one engine process,
//! draining a shared job queue with unordered completion.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::analyzer::{analyze_job, Job};
use crate::config::RunConfig;
use crate::db::AnalysisRow;
use crate::engine::UciEngine;
use crate::error::WorkerError;

type SharedJobs = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Run every job through the pool and return the completed rows in
/// completion order. Workers never touch the store; persistence stays with
/// the caller.
pub async fn run_pool(config: Arc<RunConfig>, jobs: Vec<Job>) -> Result<Vec<AnalysisRow>, WorkerError> {
    let job_count = jobs.len();
    let worker_count = config.worker_count().min(job_count.max(1));

    // Spawn every engine up front so a broken binary fails the run before
    // any job is consumed.
    let mut engines = Vec::with_capacity(worker_count);
    for worker in 0..worker_count {
        let engine = UciEngine::spawn(&config.engine, config.hash_mb).await?;
        info!(worker, engine = engine.name(), "engine ready");
        engines.push(engine);
    }

    let (job_tx, job_rx) = mpsc::channel::<Job>(job_count.max(1));
    for job in jobs {
        job_tx
            .send(job)
            .await
            .map_err(|_| WorkerError::Engine("job queue closed before start".into()))?;
    }
    drop(job_tx);
    let job_rx: SharedJobs = Arc::new(Mutex::new(job_rx));

    let (result_tx, mut result_rx) = mpsc::channel::<AnalysisRow>(64);

    let mut handles = Vec::with_capacity(worker_count);
    for (worker, engine) in engines.into_iter().enumerate() {
        handles.push(tokio::spawn(worker_loop(
            worker,
            engine,
            Arc::clone(&config),
            Arc::clone(&job_rx),
            result_tx.clone(),
        )));
    }
    drop(result_tx);

    let mut rows = Vec::with_capacity(job_count);
    while let Some(row) = result_rx.recv().await {
        rows.push(row);
    }
    for handle in handles {
        let _ = handle.await;
    }
    Ok(rows)
}

async fn worker_loop(
    worker: usize,
    mut engine: UciEngine,
    config: Arc<RunConfig>,
    job_rx: SharedJobs,
    result_tx: mpsc::Sender<AnalysisRow>,
) {
    loop {
        // Lock only long enough to take one job; first free worker wins.
        let job = { job_rx.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };

        let game_id = job.game_id;
        let outcome = analyze_job(&mut engine, &job, &config).await;
        if let Some(notes) = outcome.row.notes.as_deref() {
            warn!(worker, game_id, notes, "job finished with notes");
        }
        if result_tx.send(outcome.row).await.is_err() {
            break;
        }

        if outcome.engine_lost {
            warn!(worker, game_id, "engine process lost; respawning");
            match UciEngine::spawn(&config.engine, config.hash_mb).await {
                Ok(fresh) => engine = fresh,
                Err(e) => {
                    // The dead handle was already reaped; remaining workers
                    // keep draining the queue.
                    error!(worker, error = %e, "failed to respawn engine; retiring worker");
                    return;
                }
            }
        }
    }
    engine.quit().await;
}
