use crate::{CoreError, JobType, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive range of job types a worker announces in its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange", into = "RawRange")]
pub struct JobTypeRange {
    from: JobType,
    to: JobType,
}

impl JobTypeRange {
    /// Create a range, rejecting `from > to`
    pub fn new(from: JobType, to: JobType) -> Result<Self> {
        if from > to {
            return Err(CoreError::InvalidJobTypeRange { from, to });
        }
        Ok(JobTypeRange { from, to })
    }

    /// Range covering exactly one job type
    pub fn single(job_type: JobType) -> Self {
        JobTypeRange {
            from: job_type,
            to: job_type,
        }
    }

    pub fn from(&self) -> JobType {
        self.from
    }

    pub fn to(&self) -> JobType {
        self.to
    }
}

impl Default for JobTypeRange {
    /// `0..=0`, the placeholder range controllers expect from a plain worker.
    fn default() -> Self {
        Self::single(0)
    }
}

impl fmt::Display for JobTypeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

#[derive(Serialize, Deserialize)]
struct RawRange {
    from: JobType,
    to: JobType,
}

impl TryFrom<RawRange> for JobTypeRange {
    type Error = CoreError;

    fn try_from(raw: RawRange) -> Result<Self> {
        JobTypeRange::new(raw.from, raw.to)
    }
}

impl From<JobTypeRange> for RawRange {
    fn from(range: JobTypeRange) -> Self {
        RawRange {
            from: range.from,
            to: range.to,
        }
    }
}
