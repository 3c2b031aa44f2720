//! Per-connection protocol state machine.
//!
//! A [`ConnectionHandler`] owns nothing but immutable settings and a shared
//! registry, so one instance can drive any number of connections, each on
//! its own task.

use crate::error::{is_disconnect_kind, Result, WorkerError};
use crate::executor::JobExecutor;
use crate::handler::JobHandlerRegistry;
use futures::{SinkExt, StreamExt};
use stateline_core::{Job, JobTypeRange};
use stateline_protocol::{Framing, Hello, ProtocolError, WorkerCodec, WorkerMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    AwaitingJob,
    Executing,
    Closed,
}

/// Why a connection ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    PeerClosed,
    JobLimitReached,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub jobs_completed: u64,
    pub reason: CloseReason,
}

pub struct ConnectionHandler {
    registry: Arc<JobHandlerRegistry>,
    capabilities: JobTypeRange,
    framing: Framing,
    max_jobs: Option<u64>,
    job_timeout: Option<Duration>,
    shutdown: CancellationToken,
}

impl ConnectionHandler {
    pub fn new(registry: Arc<JobHandlerRegistry>, capabilities: JobTypeRange) -> Self {
        ConnectionHandler {
            registry,
            capabilities,
            framing: Framing::default(),
            max_jobs: None,
            job_timeout: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_max_jobs(mut self, max_jobs: Option<u64>) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    pub fn with_job_timeout(mut self, job_timeout: Option<Duration>) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Run the protocol on `io` until the peer closes, the job limit is hit or
    /// shutdown is requested.
    ///
    /// Sends Hello once, then answers every JobRequest with exactly one
    /// JobResult. A decode failure, an unknown job type or a failed job ends
    /// the connection with an error and nothing further is written. The stream
    /// is closed on every exit path.
    pub async fn run<S>(&self, io: S) -> Result<ConnectionSummary>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(io, WorkerCodec::new(self.framing));
        let mut state = ConnectionState::Connected;
        let mut jobs_completed = 0u64;

        let outcome = self
            .serve(&mut framed, &mut state, &mut jobs_completed)
            .await;

        transition(&mut state, ConnectionState::Closed);
        if let Err(e) = SinkExt::<WorkerMessage>::close(&mut framed).await {
            debug!("Error while closing connection: {}", e);
        }

        match outcome {
            Ok(reason) => {
                info!(jobs_completed, reason = ?reason, "Connection closed");
                Ok(ConnectionSummary {
                    jobs_completed,
                    reason,
                })
            }
            Err(e) if e.is_disconnect() => {
                info!(jobs_completed, "Connection closed by controller: {}", e);
                Ok(ConnectionSummary {
                    jobs_completed,
                    reason: CloseReason::PeerClosed,
                })
            }
            Err(e) => {
                error!("Connection terminated: {}", e);
                Err(e)
            }
        }
    }

    async fn serve<S>(
        &self,
        framed: &mut Framed<S, WorkerCodec>,
        state: &mut ConnectionState,
        jobs_completed: &mut u64,
    ) -> Result<CloseReason>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let executor = JobExecutor::new(self.registry.clone(), self.job_timeout);

        framed
            .send(WorkerMessage::Hello(Hello::new(self.capabilities)))
            .await?;
        info!(job_types = %self.capabilities, framing = %self.framing, "Sent hello");
        transition(state, ConnectionState::AwaitingJob);

        let reason = loop {
            if self.max_jobs.is_some_and(|max| *jobs_completed >= max) {
                break CloseReason::JobLimitReached;
            }

            let next = tokio::select! {
                next = framed.next() => next,
                _ = self.shutdown.cancelled() => break CloseReason::Shutdown,
            };

            let request = match next {
                Some(Ok(request)) => request,
                Some(Err(ProtocolError::IoError(e))) if is_disconnect_kind(e.kind()) => {
                    warn!("Connection lost: {}", e);
                    break CloseReason::PeerClosed;
                }
                Some(Err(e)) => return Err(WorkerError::Protocol(e)),
                None => break CloseReason::PeerClosed,
            };

            transition(state, ConnectionState::Executing);
            let job = Job::try_from(request)?;
            let output = executor.execute(&job).await?;

            framed.send(WorkerMessage::JobResult(output.into())).await?;
            *jobs_completed += 1;
            debug!(job_id = output.job_id, result = output.value, "Sent job result");

            transition(state, ConnectionState::AwaitingJob);
        };

        Ok(reason)
    }
}

fn transition(state: &mut ConnectionState, next: ConnectionState) {
    tracing::trace!(from = ?*state, to = ?next, "Connection state change");
    *state = next;
}
