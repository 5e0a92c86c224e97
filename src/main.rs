mod archive;
mod cache;
mod cli;
mod composition;
mod config;
mod error;
mod job_service;
mod orchestrator;
mod state_machine;
mod ui;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use archive::ReportArchiver;
use cache::JobCache;
use cli::{Cli, Command};
use config::XrfConfig;
use job_service::JobApiClient;
use orchestrator::Workflow;
use ui::StageProgress;

fn init_tracing(verbose: bool) {
    let default = if verbose { "xrfjob=debug" } else { "xrfjob=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = XrfConfig::load(cli.config.as_deref())?;
    let cache = JobCache::open(&config.cache_dir)
        .with_context(|| format!("failed to open cache at {}", config.cache_dir.display()))?;
    let archiver = ReportArchiver::new(&config.report_dir);
    let client = JobApiClient::from_config(&config).context("failed to build HTTP client")?;
    let workflow = Workflow::new(client, cache, archiver, config);

    let result = match cli.command {
        Command::Fetch {
            request_num,
            job_num,
            machine,
        } => {
            let progress = StageProgress::start(&format!("Fetching job {job_num}..."));
            workflow
                .fetch(&request_num, &job_num, &machine)
                .await
                .map(|outcome| progress.fetched(&outcome))
                .inspect_err(|e| progress.failed(e))
        }
        Command::Generate => {
            let progress = StageProgress::start("Generating readings...");
            workflow
                .generate()
                .await
                .map(|outcome| progress.generated(&outcome))
                .inspect_err(|e| progress.failed(e))
        }
        Command::Submit => {
            let progress = StageProgress::start("Submitting readings...");
            workflow
                .submit()
                .await
                .map(|outcome| progress.submitted(&outcome))
                .inspect_err(|e| progress.failed(e))
        }
        Command::Status => {
            let status = workflow.status().await?;
            ui::print_status(&status);
            Ok(())
        }
        Command::Reset => {
            workflow.reset().await?;
            println!("Job cache cleared.");
            Ok(())
        }
    };

    Ok(match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    })
}
