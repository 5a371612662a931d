use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use cloudops_common::{BackupConfig, JenkinsConfig, ReaperConfig};
use cloudops_jobs::provider_manager::ProviderManager;
use cloudops_jobs::{backup_job, failure_report_job, idle_reaper_job};
use serde::Serialize;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cloudops",
    about = "CI failure reports, idle instance reaping and snapshot rotation",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repeat the job every SECS seconds instead of running it once
    #[arg(long, global = true, value_name = "SECS")]
    every: Option<u64>,
    /// Output format for the report on stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the recent failed builds of a Jenkins job by console log
    CiReport,
    /// Stop running instances whose trailing CPU average is below the threshold
    ReapIdle {
        /// Report idle instances without stopping them
        #[arg(long)]
        dry_run: bool,
    },
    /// Snapshot the volumes of tagged instances, then delete expired snapshots
    Backup {
        /// Report what would be created and deleted without doing it
        #[arg(long)]
        dry_run: bool,
        /// Only take snapshots; leave existing ones alone
        #[arg(long)]
        skip_retention: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    // Logs go to stderr so stdout only carries the report.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(secs) = cli.every else {
        return run_command(&cli.command, cli.format).await;
    };
    if secs == 0 {
        bail!("--every must be at least 1 second");
    }

    let mut interval = tokio::time::interval(Duration::from_secs(secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(every_secs = secs, "scheduled mode started");
    loop {
        interval.tick().await;
        if let Err(e) = run_command(&cli.command, cli.format).await {
            error!("job run failed: {:?}", e);
        }
    }
}

async fn run_command(command: &Commands, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        Commands::CiReport => {
            let config = JenkinsConfig::from_env().context("invalid Jenkins configuration")?;
            let ci = ProviderManager::get_ci_server(&config)?;
            let report = failure_report_job::run_once(ci.as_ref(), &config).await?;
            emit(format, &report, || report.render(Utc::now().date_naive()))
        }
        Commands::ReapIdle { dry_run } => {
            let mut config = ReaperConfig::from_env().context("invalid reaper configuration")?;
            config.dry_run = *dry_run;
            let provider = ProviderManager::get_provider(&ProviderManager::current_provider_name())?;
            let report = idle_reaper_job::run_once(provider.as_ref(), &config, Utc::now()).await?;
            emit(format, &report, || report.render(config.dry_run))
        }
        Commands::Backup {
            dry_run,
            skip_retention,
        } => {
            let mut config = BackupConfig::from_env().context("invalid backup configuration")?;
            config.dry_run = *dry_run;
            config.skip_retention = *skip_retention;
            let provider = ProviderManager::get_provider(&ProviderManager::current_provider_name())?;
            let report =
                backup_job::run_once(provider.as_ref(), &config, Utc::now().date_naive()).await?;
            emit(format, &report, || report.render())
        }
    }
}

fn emit<T: Serialize>(
    format: OutputFormat,
    report: &T,
    text: impl FnOnce() -> String,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}
