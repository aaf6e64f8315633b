//! Worker error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("engine terminated")]
    EngineTerminated,
}
