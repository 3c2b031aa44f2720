pub mod worker;
pub mod connection;
pub mod handler;
pub mod executor;
pub mod config;
pub mod error;

pub use worker::Worker;
pub use connection::{CloseReason, ConnectionHandler, ConnectionState, ConnectionSummary};
pub use handler::{JobHandler, JobHandlerRegistry};
pub use config::WorkerConfig;
pub use error::{Result, WorkerError};
