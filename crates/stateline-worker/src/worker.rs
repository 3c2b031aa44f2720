use crate::config::{split_address, WorkerConfig};
use crate::connection::{ConnectionHandler, ConnectionSummary};
use crate::error::{Result, WorkerError};
use crate::handler::JobHandlerRegistry;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use std::sync::Arc;
use tracing::{info, warn, Instrument};

/// Worker process that dials a controller and serves its jobs
pub struct Worker {
    config: WorkerConfig,
    worker_id: String,
    registry: Arc<JobHandlerRegistry>,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(config: WorkerConfig, registry: JobHandlerRegistry) -> Self {
        let worker_id = config.generate_worker_id();

        Worker {
            config,
            worker_id,
            registry: Arc::new(registry),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Token that stops the worker when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Connect to the controller and serve one connection until it ends
    pub async fn run(&self) -> Result<ConnectionSummary> {
        self.config.validate()?;

        let span = tracing::info_span!("worker", id = %self.worker_id);
        async {
            info!(
                "Starting worker, job types {} (registered: {:?})",
                self.config.job_types,
                self.registry.job_types()
            );

            let stream = self.connect().await?;
            stream.set_nodelay(true)?;
            info!("Connected to controller at {}", self.config.controller_address);

            let handler = ConnectionHandler::new(self.registry.clone(), self.config.job_types)
                .with_framing(self.config.framing)
                .with_max_jobs(self.config.max_jobs)
                .with_job_timeout(self.config.job_timeout())
                .with_shutdown(self.shutdown.clone());

            handler.run(stream).await
        }
        .instrument(span)
        .await
    }

    /// Dial the controller, retrying with exponential backoff
    async fn connect(&self) -> Result<TcpStream> {
        let address = &self.config.controller_address;
        let (host, port) = split_address(address)?;
        let mut attempt = 0u32;

        loop {
            let err = match TcpStream::connect((host, port)).await {
                Ok(stream) => return Ok(stream),
                Err(e) => e,
            };

            if attempt >= self.config.connect_retries {
                return Err(WorkerError::Connect {
                    address: address.clone(),
                    source: err,
                });
            }

            attempt += 1;
            let delay = self.config.backoff(attempt);
            warn!(
                "Failed to connect to {} ({}), retry {}/{} in {:?}",
                address, err, attempt, self.config.connect_retries, delay
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.cancelled() => {
                    return Err(WorkerError::Connect {
                        address: address.clone(),
                        source: err,
                    });
                }
            }
        }
    }
}
