use crate::error::{Result, WorkerError};
use serde::{Deserialize, Serialize};
use stateline_core::JobTypeRange;
use stateline_protocol::Framing;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Controller address as `host:port`
    pub controller_address: String,
    pub worker_id: Option<String>,
    /// Job types announced in the handshake
    pub job_types: JobTypeRange,
    pub framing: Framing,
    /// Stop after this many results (unlimited when unset)
    pub max_jobs: Option<u64>,
    /// Per-job execution limit in seconds (0 = no limit)
    pub job_timeout_secs: u64,
    /// Extra connection attempts after the first one fails
    pub connect_retries: u32,
    pub connect_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            controller_address: "127.0.0.1:5000".to_string(),
            worker_id: None,
            job_types: JobTypeRange::default(),
            framing: Framing::Raw,
            max_jobs: None,
            job_timeout_secs: 0,
            connect_retries: 0,
            connect_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

impl WorkerConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: WorkerConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Reject settings the worker cannot run with
    pub fn validate(&self) -> Result<()> {
        split_address(&self.controller_address)?;

        if self.max_jobs == Some(0) {
            return Err(WorkerError::Config("max_jobs must be at least 1".to_string()));
        }
        if self.connect_backoff_ms > self.max_backoff_ms {
            return Err(WorkerError::Config(format!(
                "connect_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.connect_backoff_ms, self.max_backoff_ms
            )));
        }

        Ok(())
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        if self.job_timeout_secs > 0 {
            Some(Duration::from_secs(self.job_timeout_secs))
        } else {
            None
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based), doubling up to the cap
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let delay = self.connect_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }

    pub fn generate_worker_id(&self) -> String {
        use std::process;
        use uuid::Uuid;

        if let Some(id) = &self.worker_id {
            return id.clone();
        }

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        let pid = process::id();
        let random = Uuid::new_v4().simple().to_string()[..8].to_string();

        format!("{}-{}-{}", hostname, pid, random)
    }
}

/// Split a `host:port` address, accepting bracketed IPv6 hosts
pub fn split_address(address: &str) -> Result<(&str, u16)> {
    let invalid = || WorkerError::InvalidAddress(address.to_string());

    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;

    Ok((host, port))
}
