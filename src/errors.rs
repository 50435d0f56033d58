//! Error types for process control operations

use std::io;
use thiserror::Error;

/// Result type for process control operations
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Errors that can occur while spawning or controlling a child process
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Syscall error: {0}")]
    Syscall(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
