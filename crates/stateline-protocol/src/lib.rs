mod message;
mod codec;
pub mod wire;

pub use message::{MessageType, Hello, JobRequest, JobResult, WorkerMessage};
pub use codec::{Framing, WorkerCodec, ControllerCodec};
pub use wire::{
    encode_hello, decode_hello, encode_job_request, decode_job_request, encode_job_result,
    decode_job_result,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unexpected message tag: {0}")]
    UnexpectedTag(i8),

    #[error("Truncated message: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(i8),

    #[error("{0} unexpected trailing bytes after message")]
    TrailingBytes(usize),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Version byte carried in Hello
pub const PROTOCOL_VERSION: i8 = 0;

/// Largest message accepted by the codecs: a JobRequest at the maximum job dimension
pub const MAX_MESSAGE_SIZE: usize =
    wire::JOB_REQUEST_HEADER_LEN + stateline_core::MAX_JOB_DIMENSION * 8;
