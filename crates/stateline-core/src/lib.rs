mod job;
mod range;
mod error;

pub use job::{Job, JobId, JobType, JobOutput};
pub use range::JobTypeRange;
pub use error::{CoreError, Result};

/// Largest input vector accepted in a single job (16 MiB of f64 data)
pub const MAX_JOB_DIMENSION: usize = 2 * 1024 * 1024;
