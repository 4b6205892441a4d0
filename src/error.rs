use crate::snapshot::{ProcessId, ResourceId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown resource '{rid}' in {table} entry for process {pid}")]
    UnknownResource {
        pid: ProcessId,
        rid: ResourceId,
        table: &'static str,
    },

    #[error("Duplicate process id: {0}")]
    DuplicateProcess(ProcessId),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Input too large for exhaustive search: {processes} processes (limit {limit})")]
    InputTooLarge { processes: usize, limit: usize },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, Error>;
