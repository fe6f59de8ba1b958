use anyhow::Context;
use clap::{Parser, Subcommand};
use cloudplane_compute::ControlPlane;
use cloudplane_config::ControlPlaneConfig;
use cloudplane_sync::Actor;
use cloudplane_task::{Task, TaskStatus, TracingOpsLog};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cloudplaned")]
#[command(about = "Multi-cloud control plane daemon", long_about = None)]
struct Cli {
    /// Config file (defaults to CLOUDPLANE_CONFIG_PATH, ./cloudplane.yaml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run periodic syncs until interrupted
    Serve,
    /// Sync NAT SKUs once
    #[command(name = "sync-nat-skus")]
    SyncNatSkus {
        /// Restrict to one region
        #[arg(short, long)]
        region: Option<String>,
        /// Skip when any SKU already exists
        #[arg(long)]
        only_if_empty: bool,
    },
    /// List configured regions
    Regions,
    /// Show version
    Version,
}

/// `RUST_LOG` when set and valid; otherwise info, or debug with `--verbose`
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

fn init_tracing(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, rust_log.as_deref()))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ControlPlaneConfig> {
    match path {
        Some(path) => cloudplane_config::load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => cloudplane_config::load_or_default().context("Failed to load config"),
    }
}

fn print_task(task: &Task) {
    let status = match task.status() {
        TaskStatus::Complete => "complete".green(),
        TaskStatus::Failed => "failed".red(),
        TaskStatus::Running => "running".yellow(),
    };
    println!("{} {} [{}]", task.task_type.cyan(), task.id.dimmed(), status);
    if let Some(result) = task.result() {
        match serde_json::to_string_pretty(result) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", result),
        }
    }
}

async fn serve(cp: ControlPlane) -> anyhow::Result<()> {
    if cp.config().task.resume_on_start {
        let handles = cp
            .tasks()
            .resume_unfinished()
            .await
            .context("Failed to resume unfinished tasks")?;
        for handle in handles {
            tokio::spawn(async move {
                match handle.await {
                    Ok(Err(e)) => tracing::warn!("Resumed task error: {}", e),
                    Err(e) => tracing::warn!("Resumed task panicked: {}", e),
                    Ok(Ok(_)) => {}
                }
            });
        }
    }

    let cancel = CancellationToken::new();
    let scheduler = cp.scheduler();
    let worker = {
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    println!("{}", "cloudplaned running, Ctrl-C to stop".green());
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");
    cancel.cancel();
    worker.await.context("Scheduler task panicked")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if matches!(cli.command, Commands::Version) {
        println!("cloudplaned {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = load_config(cli.config.as_ref())?;
    let cp = ControlPlane::from_config(config, Arc::new(TracingOpsLog))
        .context("Failed to assemble control plane")?;

    match cli.command {
        Commands::Serve => serve(cp).await?,
        Commands::SyncNatSkus {
            region,
            only_if_empty,
        } => {
            let task = cp
                .sync_nat_skus(&Actor::system(), region, only_if_empty)
                .await
                .context("NAT SKU sync failed")?;
            print_task(&task);
            if task.status() == TaskStatus::Failed {
                anyhow::bail!("task {} failed", task.id);
            }
        }
        Commands::Regions => {
            let regions = cp.regions().list_public(None)?;
            if regions.is_empty() {
                println!("{}", "No public regions configured".yellow());
            }
            for region in regions {
                let nat = if region.supports_nat_gateway() {
                    "nat".green()
                } else {
                    "-".dimmed()
                };
                println!(
                    "{:<12} {:<24} {:<10} {}",
                    region.id,
                    region.external_id,
                    region.provider,
                    nat
                );
            }
        }
        Commands::Version => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_overrides_default_level() {
        assert_eq!(log_filter(false, Some("warn")).to_string(), "warn");
        assert_eq!(log_filter(true, Some("warn")).to_string(), "warn");
    }

    #[test]
    fn test_default_level_follows_verbose_flag() {
        assert_eq!(log_filter(false, None).to_string(), "info");
        assert_eq!(log_filter(true, None).to_string(), "debug");
    }

    #[test]
    fn test_cli_parses_sync_flags() {
        let cli = Cli::try_parse_from([
            "cloudplaned",
            "--verbose",
            "sync-nat-skus",
            "--region",
            "r1",
            "--only-if-empty",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::SyncNatSkus {
                region,
                only_if_empty,
            } => {
                assert_eq!(region.as_deref(), Some("r1"));
                assert!(only_if_empty);
            }
            _ => panic!("expected sync-nat-skus"),
        }
    }
}
