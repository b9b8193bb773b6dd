mod cli;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use snac_runtime::{
    start_job, HttpServiceClient, JobEvent, JobReport, Presentation, RuntimeConfig,
};

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if let Some(format) = cli.command.download_format() {
        config.download_format = format;
    }
    let request = cli.command.into_request();
    let client = HttpServiceClient::new(config.clone()).context("failed to build HTTP client")?;

    let mut handle = start_job(Arc::new(client), config, request);
    let mut outcome = None;
    while let Some(event) = handle.next_event().await {
        match event {
            JobEvent::Progress(progress) => {
                info!(percent = progress.percent, "{}", progress.status_text);
            }
            JobEvent::Succeeded(report) => outcome = Some(Ok(report)),
            JobEvent::Failed(failure) => outcome = Some(Err(failure)),
        }
    }

    match outcome {
        Some(Ok(report)) => {
            print_report(&report);
            Ok(())
        }
        Some(Err(failure)) => {
            print_presentation(failure.presentation.as_ref());
            Err(failure).context("job failed")
        }
        None => bail!("job ended without a result"),
    }
}

fn print_report(report: &JobReport) {
    for failure in &report.record_failures {
        warn!(
            record = failure.record_index,
            id = %failure.record_id,
            kind = ?failure.kind,
            "{}",
            failure.message
        );
    }

    if let Some(path) = &report.output_path {
        info!(path = %path.display(), "output written");
    }

    print_presentation(report.presentation.as_ref());
}

fn print_presentation(presentation: Option<&Presentation>) {
    match presentation {
        Some(Presentation::Display { title, body }) => {
            println!("== {} ==\n{}", title, body);
        }
        Some(Presentation::ErrorReport { title, body }) => {
            eprintln!("== {} ==\n{}", title, body);
        }
        None => {}
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
