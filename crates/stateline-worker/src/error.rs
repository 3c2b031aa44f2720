use stateline_core::{CoreError, JobId, JobType};
use stateline_protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Invalid job: {0}")]
    InvalidJob(#[from] CoreError),

    #[error("No handler registered for job type {0}")]
    UnsupportedJobType(JobType),

    #[error("Job {job_id} failed: {reason}")]
    JobFailed { job_id: JobId, reason: String },

    #[error("Failed to connect to controller at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid controller address '{0}': expected host:port")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl WorkerError {
    /// True when the error only means the peer went away
    pub fn is_disconnect(&self) -> bool {
        match self {
            WorkerError::Protocol(ProtocolError::IoError(e)) | WorkerError::IoError(e) => {
                is_disconnect_kind(e.kind())
            }
            _ => false,
        }
    }
}

pub(crate) fn is_disconnect_kind(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind::*;
    matches!(
        kind,
        ConnectionReset | ConnectionAborted | BrokenPipe | UnexpectedEof | NotConnected
    )
}

pub type Result<T> = std::result::Result<T, WorkerError>;
