use async_trait::async_trait;
use parking_lot::RwLock;
use stateline_core::JobType;
use std::collections::HashMap;
use std::sync::Arc;

/// Result type for job handlers
pub type JobOutcome = Result<f64, String>;

/// Trait for job handlers
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Evaluate the job's input vector
    async fn execute(&self, data: Vec<f64>) -> JobOutcome;
}

/// Adapter turning a pure function into a [`JobHandler`]
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    pub fn new(func: F) -> Self {
        FnHandler { func }
    }
}

#[async_trait]
impl<F> JobHandler for FnHandler<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    async fn execute(&self, data: Vec<f64>) -> JobOutcome {
        Ok((self.func)(&data))
    }
}

/// Registry of job handlers by job type
pub struct JobHandlerRegistry {
    handlers: Arc<RwLock<HashMap<JobType, Arc<dyn JobHandler>>>>,
}

impl JobHandlerRegistry {
    pub fn new() -> Self {
        JobHandlerRegistry {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registry with the built-in handlers:
    /// 1 = sum, 2 = Gaussian NLL, 3 = bimodal NLL
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(SUM_JOB_TYPE, SumHandler);
        registry.register(GAUSSIAN_JOB_TYPE, GaussianNllHandler);
        registry.register(BIMODAL_JOB_TYPE, BimodalNllHandler);
        registry
    }

    /// Register a job handler for a specific job type, replacing any previous one
    pub fn register<H: JobHandler + 'static>(&self, job_type: JobType, handler: H) {
        let mut handlers = self.handlers.write();
        handlers.insert(job_type, Arc::new(handler));
    }

    /// Register a pure function for a job type
    pub fn register_fn<F>(&self, job_type: JobType, func: F)
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        self.register(job_type, FnHandler::new(func));
    }

    /// Get a handler for a job type
    pub fn get(&self, job_type: JobType) -> Option<Arc<dyn JobHandler>> {
        let handlers = self.handlers.read();
        handlers.get(&job_type).cloned()
    }

    /// Check if a handler is registered for a job type
    pub fn has_handler(&self, job_type: JobType) -> bool {
        let handlers = self.handlers.read();
        handlers.contains_key(&job_type)
    }

    /// Get all registered job types, sorted
    pub fn job_types(&self) -> Vec<JobType> {
        let handlers = self.handlers.read();
        let mut types: Vec<JobType> = handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

impl Default for JobHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub const SUM_JOB_TYPE: JobType = 1;
pub const GAUSSIAN_JOB_TYPE: JobType = 2;
pub const BIMODAL_JOB_TYPE: JobType = 3;

/// Sums the input vector
pub struct SumHandler;

#[async_trait]
impl JobHandler for SumHandler {
    async fn execute(&self, data: Vec<f64>) -> JobOutcome {
        Ok(data.iter().sum())
    }
}

/// Negative log-likelihood of a standard normal, up to a constant: `|x|^2`
pub struct GaussianNllHandler;

#[async_trait]
impl JobHandler for GaussianNllHandler {
    async fn execute(&self, data: Vec<f64>) -> JobOutcome {
        Ok(data.iter().map(|x| x * x).sum())
    }
}

/// Negative log-likelihood of an equal mixture of unit Gaussians at -3 and 3
pub struct BimodalNllHandler;

impl BimodalNllHandler {
    fn density(data: &[f64], mean: f64) -> f64 {
        let norm_squared: f64 = data.iter().map(|x| (x - mean) * (x - mean)).sum();
        (-norm_squared / 2.0).exp()
    }
}

#[async_trait]
impl JobHandler for BimodalNllHandler {
    async fn execute(&self, data: Vec<f64>) -> JobOutcome {
        Ok(-(Self::density(&data, -3.0) + Self::density(&data, 3.0)).ln())
    }
}
