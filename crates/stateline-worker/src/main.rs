use clap::Parser;
use stateline_core::JobTypeRange;
use stateline_protocol::Framing;
use stateline_worker::{JobHandlerRegistry, Worker, WorkerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sl-worker")]
#[command(about = "Stateline job worker", long_about = None)]
struct Args {
    /// Address of the stateline controller (host:port)
    address: String,

    /// Worker ID (auto-generated if not provided)
    #[arg(long)]
    worker_id: Option<String>,

    /// Message framing: raw or length-prefixed
    #[arg(long)]
    framing: Option<Framing>,

    /// Exit after serving this many jobs
    #[arg(long)]
    max_jobs: Option<u64>,

    /// First job type announced in the handshake
    #[arg(long, requires = "job_type_to")]
    job_type_from: Option<u32>,

    /// Last job type announced in the handshake
    #[arg(long, requires = "job_type_from")]
    job_type_to: Option<u32>,

    /// Path to configuration file
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        WorkerConfig::from_file(config_path)?
    } else {
        WorkerConfig::default()
    };

    // Override with CLI args
    config.controller_address = args.address;
    if let Some(worker_id) = args.worker_id {
        config.worker_id = Some(worker_id);
    }
    if let Some(framing) = args.framing {
        config.framing = framing;
    }
    if args.max_jobs.is_some() {
        config.max_jobs = args.max_jobs;
    }
    if let (Some(from), Some(to)) = (args.job_type_from, args.job_type_to) {
        config.job_types = JobTypeRange::new(from, to)?;
    }

    let registry = JobHandlerRegistry::with_builtins();
    tracing::info!("Registered job types: {:?}", registry.job_types());

    let worker = Worker::new(config, registry);

    // Handle shutdown signals
    let shutdown = worker.shutdown_token();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal");
        shutdown.cancel();
    });

    let summary = worker.run().await?;
    tracing::info!(
        "Worker {} finished after {} jobs ({:?})",
        worker.worker_id(),
        summary.jobs_completed,
        summary.reason
    );

    Ok(())
}
