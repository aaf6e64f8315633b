pub use chess;

pub mod analyzer;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod pool;
pub mod resolve;
pub mod score;
