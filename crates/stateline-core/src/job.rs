use crate::{CoreError, Result, MAX_JOB_DIMENSION};
use serde::{Deserialize, Serialize};

/// Controller-chosen job identifier, echoed back unchanged in the result
pub type JobId = u32;

/// Selects which operation a worker runs on the job data
pub type JobType = u32;

/// A job as received from the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque identifier
    pub id: JobId,

    /// Operation selector
    pub job_type: JobType,

    /// Input vector
    pub data: Vec<f64>,
}

impl Job {
    /// Create a new job
    pub fn new(id: JobId, job_type: JobType, data: Vec<f64>) -> Result<Self> {
        if data.len() > MAX_JOB_DIMENSION {
            return Err(CoreError::DimensionTooLarge {
                max: MAX_JOB_DIMENSION,
                actual: data.len(),
            });
        }

        Ok(Job { id, job_type, data })
    }

    /// Number of elements in the input vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Build the output for this job
    pub fn output(&self, value: f64) -> JobOutput {
        JobOutput {
            job_id: self.id,
            value,
        }
    }
}

/// Value computed for a job
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    pub job_id: JobId,
    pub value: f64,
}
