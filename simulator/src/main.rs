use anyhow::Context;
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::{Runner, SessionReport};

mod generator;
mod platform;
mod store;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline driver for the background location buffer")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Directory for the durable ledger (ignored with --workflow)
    #[arg(long, default_value = "tools/data/ledger")]
    store_dir: PathBuf,
    #[arg(long, default_value_t = 120)]
    points: usize,
    /// Fixes handed over per platform delivery
    #[arg(long, default_value_t = 3)]
    delivery_size: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Print the durable ledger size and exit
    #[arg(long, default_value_t = false)]
    count: bool,
    /// Erase the durable ledger and exit
    #[arg(long, default_value_t = false)]
    clear: bool,
    /// Pace deliveries in real time until the route ends or Ctrl+C
    #[arg(long, default_value_t = false)]
    live: bool,
    /// Milliseconds between live deliveries
    #[arg(long, default_value_t = 3_000)]
    interval_ms: u64,
    /// Append a JSON session summary to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = args.workflow.as_ref() {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(
            args.store_dir.clone(),
            args.points,
            args.delivery_size,
            args.seed,
        )
    };
    let runner = Runner::new(workflow_config);

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;

    runtime.block_on(async {
        if args.clear {
            runner.clear().await?;
            println!("Ledger cleared");
            return Ok(());
        }
        if args.count {
            println!("Ledger holds {} samples", runner.ledger_count().await?);
            return Ok(());
        }

        let report = if args.live {
            println!("Live tracking (Ctrl+C to stop)...");
            let interrupt = async {
                if let Err(err) = signal::ctrl_c().await {
                    log::error!("awaiting Ctrl+C: {}", err);
                    std::future::pending::<()>().await;
                }
            };
            runner
                .execute_live(Duration::from_millis(args.interval_ms), interrupt)
                .await?
        } else {
            runner.execute().await?
        };

        print_report(&report);
        if let Some(path) = args.report.as_ref() {
            append_report(path, &report)?;
        }
        Ok::<(), anyhow::Error>(())
    })
}

fn print_report(report: &SessionReport) {
    if !report.started {
        println!("Tracking not started: location permission denied");
    }
    println!(
        "Session -> deliveries {}, points {}, stopped cleanly {}, ledger {}",
        report.deliveries, report.points_delivered, report.stopped, report.ledger_count
    );
    println!(
        "Metrics -> flushes {}, failures {}, persisted {}, dropped {}",
        report.metrics.flushes,
        report.metrics.flush_failures,
        report.metrics.samples_persisted,
        report.metrics.samples_dropped
    );
}

fn append_report(path: &Path, report: &SessionReport) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(report).context("encoding session report")?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening report {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}
