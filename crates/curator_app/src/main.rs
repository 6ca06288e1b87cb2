mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use curator_engine::PipelineRunner;
use curator_logging::{curator_error, curator_info, curator_warn, initialize_run_log, LogDestination};
use log::LevelFilter;
use tokio_util::sync::CancellationToken;

/// Curate RSS sources into a filtered feed with locally stored images.
#[derive(Parser, Debug)]
#[command(name = "feed-curator", version, about)]
struct Args {
    /// RON job file describing sources, rules and output.
    job: PathBuf,

    /// Directory for the output document, images and run log.
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Log to the run log file only.
    #[arg(long)]
    quiet: bool,

    /// Include debug lines in the log.
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            curator_error!("{err:#}");
            eprintln!("feed-curator: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let job = config::load_job(&args.job, args.work_dir)?;

    let destination = if args.quiet {
        LogDestination::File
    } else {
        LogDestination::Both
    };
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    initialize_run_log(destination, &job.log_path(), level)
        .with_context(|| format!("opening run log {}", job.log_path().display()))?;
    curator_info!("Starting job {} ({} feed(s))", args.job.display(), job.feeds.len());

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(async move {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                curator_warn!("Interrupted, cancelling run");
                on_interrupt.cancel();
            }
        });

        let report = PipelineRunner::new(job).run(&cancel).await?;
        if !args.quiet {
            println!("{}", report.output_path.display());
            println!("{}", report.summary);
        }
        Ok(())
    })
}
