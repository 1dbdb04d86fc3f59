mod display;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dealflow_ai::{CancellationFlag, Orchestrator, ProgressEvent, ProgressReporter};
use dealflow_client::{ClientConfig, HttpClient, RetryingAnalysisClient};
use dealflow_core::StartupProfile;
use dealflow_store::{AnalysisStore, DuckStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Run and inspect comprehensive startup analyses.
#[derive(Parser, Debug)]
#[command(name = "dealflow", version)]
struct Cli {
    /// Base URL of the analysis service.
    #[arg(long, env = "DEALFLOW_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// DuckDB database file. In-memory when absent.
    #[arg(long, env = "DEALFLOW_DB")]
    db: Option<PathBuf>,

    /// Attempts per analysis step.
    #[arg(long, env = "DEALFLOW_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Base delay between attempts, multiplied by the attempt number.
    #[arg(long, env = "DEALFLOW_RETRY_DELAY_MS", default_value_t = 2_000)]
    retry_delay_ms: u64,

    /// Upper bound on a single attempt.
    #[arg(long, env = "DEALFLOW_MAX_WAIT_MS", default_value_t = 300_000)]
    max_wait_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the comprehensive analysis for a submitted startup profile.
    Analyze {
        /// JSON file holding the startup profile.
        #[arg(long)]
        profile: PathBuf,
    },
    /// Print the stored aggregate analysis for a startup.
    Show { subject_id: String },
    /// List the individual step records for a startup.
    History { subject_id: String },
    /// Check that the analysis service is reachable.
    Health,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_url.clone())
            .with_max_retries(self.max_retries)
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
            .with_max_wait_time(Duration::from_millis(self.max_wait_ms))
    }

    fn open_store(&self) -> anyhow::Result<Arc<dyn AnalysisStore>> {
        let store = match &self.db {
            Some(path) => DuckStore::open_persistent(path)
                .with_context(|| format!("opening database {}", path.display()))?,
            None => DuckStore::open().context("opening in-memory database")?,
        };
        Ok(Arc::new(store))
    }
}

/// Logs each step as it starts and finishes.
struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::StepStarted {
                index,
                total,
                name,
                percent,
            } => info!(step = %name, index, total, percent, "step started"),
            ProgressEvent::StepFinished { key, status, .. } => {
                info!(step = %key, %status, "step finished")
            }
            ProgressEvent::Finished { percent } => info!(percent, "analysis finished"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("dealflow v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.client_config();
    let http = Arc::new(HttpClient::from_config(&config));

    match &cli.command {
        Command::Health => {
            let body = http
                .health()
                .await
                .with_context(|| format!("analysis service at {} is unreachable", config.base_url))?;
            println!("{} is healthy", config.base_url);
            if !body.is_null() {
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
        }
        Command::Analyze { profile } => {
            let raw = std::fs::read_to_string(profile)
                .with_context(|| format!("reading {}", profile.display()))?;
            let subject: StartupProfile = serde_json::from_str(&raw)
                .with_context(|| format!("parsing startup profile {}", profile.display()))?;

            let client = Arc::new(RetryingAnalysisClient::new(http.clone(), config));
            let orchestrator = Orchestrator::new(client, cli.open_store()?, http);

            let cancel = CancellationFlag::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping after the current step");
                    on_interrupt.cancel();
                }
            });

            let report = orchestrator
                .run_comprehensive_analysis(&subject, &LogProgress, &cancel)
                .await?;
            display::print_report(&report);
        }
        Command::Show { subject_id } => {
            let orchestrator = read_only(&cli, http)?;
            match orchestrator.latest_analysis(subject_id).await? {
                Some(stored) => display::print_aggregate(&stored),
                None => println!("No analysis stored for {subject_id}"),
            }
        }
        Command::History { subject_id } => {
            let orchestrator = read_only(&cli, http)?;
            let history = orchestrator.analysis_history(subject_id).await?;
            display::print_history(subject_id, &history);
        }
    }

    Ok(())
}

/// Orchestrator used only for store lookups.
fn read_only(cli: &Cli, http: Arc<HttpClient>) -> anyhow::Result<Orchestrator> {
    if cli.db.is_none() {
        warn!("no --db given; reading from an empty in-memory database");
    }
    let client = Arc::new(RetryingAnalysisClient::new(http.clone(), cli.client_config()));
    Ok(Orchestrator::new(client, cli.open_store()?, http))
}
