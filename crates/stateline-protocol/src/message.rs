use serde::{Deserialize, Serialize};
use stateline_core::{CoreError, Job, JobId, JobOutput, JobType, JobTypeRange};

/// Leading tag byte of every message on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum MessageType {
    Hello = 1,
    JobRequest = 2,
    JobResult = 3,
}

impl MessageType {
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            1 => Some(MessageType::Hello),
            2 => Some(MessageType::JobRequest),
            3 => Some(MessageType::JobResult),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> i8 {
        *self as i8
    }
}

/// Handshake sent once by the worker right after connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub version: i8,
    pub job_type_from: JobType,
    pub job_type_to: JobType,
}

impl Hello {
    /// Hello for the current protocol version announcing `range`
    pub fn new(range: JobTypeRange) -> Self {
        Hello {
            version: crate::PROTOCOL_VERSION,
            job_type_from: range.from(),
            job_type_to: range.to(),
        }
    }

    /// Announced capability range; fails if the peer sent an inverted range
    pub fn job_types(&self) -> Result<JobTypeRange, CoreError> {
        JobTypeRange::new(self.job_type_from, self.job_type_to)
    }
}

/// Job dispatched by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: JobId,
    pub job_type: JobType,
    pub vector: Vec<f64>,
}

impl From<Job> for JobRequest {
    fn from(job: Job) -> Self {
        JobRequest {
            job_id: job.id,
            job_type: job.job_type,
            vector: job.data,
        }
    }
}

impl TryFrom<JobRequest> for Job {
    type Error = CoreError;

    fn try_from(req: JobRequest) -> Result<Self, CoreError> {
        Job::new(req.job_id, req.job_type, req.vector)
    }
}

/// Worker reply carrying the computed value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub result: f64,
}

impl From<JobOutput> for JobResult {
    fn from(output: JobOutput) -> Self {
        JobResult {
            job_id: output.job_id,
            result: output.value,
        }
    }
}

/// Messages a worker writes and a controller reads
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    Hello(Hello),
    JobResult(JobResult),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_conversion() {
        assert_eq!(MessageType::from_i8(1), Some(MessageType::Hello));
        assert_eq!(MessageType::from_i8(3), Some(MessageType::JobResult));
        assert_eq!(MessageType::from_i8(0), None);
        assert_eq!(MessageType::from_i8(-1), None);

        assert_eq!(MessageType::JobRequest.as_i8(), 2);
    }

    #[test]
    fn test_hello_from_range() {
        let hello = Hello::new(JobTypeRange::new(2, 9).unwrap());
        assert_eq!(hello.version, 0);
        assert_eq!(hello.job_type_from, 2);
        assert_eq!(hello.job_type_to, 9);
        assert_eq!(hello.job_types().unwrap(), JobTypeRange::new(2, 9).unwrap());
    }

    #[test]
    fn test_inverted_hello_range() {
        let hello = Hello {
            version: 0,
            job_type_from: 4,
            job_type_to: 1,
        };
        assert!(hello.job_types().is_err());
    }

    #[test]
    fn test_request_job_conversion() {
        let req = JobRequest {
            job_id: 11,
            job_type: 1,
            vector: vec![0.5, 1.5],
        };
        let job = Job::try_from(req.clone()).unwrap();
        assert_eq!(job.id, 11);
        assert_eq!(JobRequest::from(job), req);
    }

    #[test]
    fn test_oversized_request_rejected() {
        let req = JobRequest {
            job_id: 1,
            job_type: 1,
            vector: vec![0.0; stateline_core::MAX_JOB_DIMENSION + 1],
        };
        assert!(matches!(
            Job::try_from(req),
            Err(CoreError::DimensionTooLarge { .. })
        ));
    }
}
