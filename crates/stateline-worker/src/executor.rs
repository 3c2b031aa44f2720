use crate::error::{Result, WorkerError};
use crate::handler::JobHandlerRegistry;
use stateline_core::{Job, JobOutput};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error};

/// Looks up and runs the handler for a job
pub struct JobExecutor {
    registry: Arc<JobHandlerRegistry>,
    job_timeout: Option<Duration>,
}

impl JobExecutor {
    pub fn new(registry: Arc<JobHandlerRegistry>, job_timeout: Option<Duration>) -> Self {
        JobExecutor {
            registry,
            job_timeout,
        }
    }

    /// Execute a job, with panic recovery and the optional timeout
    pub async fn execute(&self, job: &Job) -> Result<JobOutput> {
        let handler = self
            .registry
            .get(job.job_type)
            .ok_or(WorkerError::UnsupportedJobType(job.job_type))?;

        debug!(
            job_id = job.id,
            job_type = job.job_type,
            dimension = job.dimension(),
            "Executing job"
        );

        let data = job.data.clone();
        let mut task = tokio::spawn(async move { handler.execute(data).await });

        let joined = match self.job_timeout {
            Some(limit) => match timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    error!(job_id = job.id, "Job timed out after {:?}", limit);
                    return Err(WorkerError::JobFailed {
                        job_id: job.id,
                        reason: format!("execution timed out after {:?}", limit),
                    });
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(value)) => Ok(job.output(value)),
            Ok(Err(reason)) => {
                error!(job_id = job.id, "Job failed: {}", reason);
                Err(WorkerError::JobFailed {
                    job_id: job.id,
                    reason,
                })
            }
            Err(e) => {
                let reason = if e.is_panic() {
                    "handler panicked".to_string()
                } else {
                    "handler was cancelled".to_string()
                };
                error!(job_id = job.id, "Job failed: {}", reason);
                Err(WorkerError::JobFailed {
                    job_id: job.id,
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{JobHandler, JobOutcome, SumHandler};
    use async_trait::async_trait;

    struct SleepHandler {
        duration_ms: u64,
    }

    #[async_trait]
    impl JobHandler for SleepHandler {
        async fn execute(&self, data: Vec<f64>) -> JobOutcome {
            tokio::time::sleep(Duration::from_millis(self.duration_ms)).await;
            Ok(data.len() as f64)
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl JobHandler for FailingHandler {
        async fn execute(&self, _data: Vec<f64>) -> JobOutcome {
            Err("diverged".to_string())
        }
    }

    fn registry() -> Arc<JobHandlerRegistry> {
        let registry = JobHandlerRegistry::new();
        registry.register(1, SumHandler);
        registry.register(2, SleepHandler { duration_ms: 2000 });
        registry.register(3, FailingHandler);
        registry.register_fn(4, |_| panic!("bad input"));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_executor_success() {
        let executor = JobExecutor::new(registry(), None);
        let job = Job::new(42, 1, vec![1.0, 2.0, 3.0]).unwrap();

        let output = executor.execute(&job).await.unwrap();
        assert_eq!(output.job_id, 42);
        assert_eq!(output.value, 6.0);
    }

    #[tokio::test]
    async fn test_executor_unknown_type() {
        let executor = JobExecutor::new(registry(), None);
        let job = Job::new(1, 99, vec![]).unwrap();

        assert!(matches!(
            executor.execute(&job).await,
            Err(WorkerError::UnsupportedJobType(99))
        ));
    }

    #[tokio::test]
    async fn test_executor_timeout() {
        let executor = JobExecutor::new(registry(), Some(Duration::from_millis(100)));
        let job = Job::new(5, 2, vec![1.0]).unwrap();

        match executor.execute(&job).await {
            Err(WorkerError::JobFailed { job_id, reason }) => {
                assert_eq!(job_id, 5);
                assert!(reason.contains("timed out"));
            }
            other => panic!("Expected JobFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_executor_handler_error() {
        let executor = JobExecutor::new(registry(), None);
        let job = Job::new(6, 3, vec![]).unwrap();

        match executor.execute(&job).await {
            Err(WorkerError::JobFailed { reason, .. }) => assert_eq!(reason, "diverged"),
            other => panic!("Expected JobFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_executor_recovers_from_panic() {
        let executor = JobExecutor::new(registry(), None);
        let job = Job::new(7, 4, vec![1.0]).unwrap();

        match executor.execute(&job).await {
            Err(WorkerError::JobFailed { reason, .. }) => assert!(reason.contains("panicked")),
            other => panic!("Expected JobFailed, got {:?}", other),
        }
    }
}
