//! Thin CLI client for Wida, built on `clap`'s derive API for subcommand
//! parsing.

use clap::{Parser, Subcommand};
use wida_core::job::Job;

#[derive(Parser)]
#[command(name = "widactl", version, about = "CLI client for the Wida job queue")]
struct Cli {
    /// Base URL of the widad HTTP surface to talk to.
    #[arg(long, global = true, default_value = "http://localhost:8080")]
    host: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a job on `queue` with a raw JSON `payload`.
    Enqueue { queue: String, payload: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Enqueue { queue, payload } => match enqueue(&cli.host, &queue, &payload).await {
            Ok(()) => {}
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(1);
            }
        },
    }
}

async fn enqueue(host: &str, queue: &str, payload: &str) -> anyhow::Result<()> {
    let payload: serde_json::Value = serde_json::from_str(payload)
        .map_err(|err| anyhow::anyhow!("payload must be valid JSON: {err}"))?;

    let job = Job::new(format!("job-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()), queue, payload);

    let url = format!("{}/api/jobs/enqueue", host.trim_end_matches('/'));
    let response = reqwest::Client::new().post(&url).json(&job).send().await?;

    if response.status() == reqwest::StatusCode::CREATED {
        println!("Job enqueued successfully: {}", job.id);
        Ok(())
    } else {
        anyhow::bail!("failed to enqueue job, status code: {}", response.status());
    }
}
