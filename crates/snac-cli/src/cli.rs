use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use snac_runtime::{DownloadFormat, JobKind, JobRequest};

#[derive(Parser, Debug)]
#[command(
    name = "snac",
    version,
    about = "Reconcile names, parse and validate EAC-CPF against SNAC"
)]
pub struct Cli {
    /// Runtime configuration (YAML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile every row of a CBW table against SNAC
    Reconcile(JobArgs),

    /// Parse an EAC-CPF document with SNAC-Alpha
    Parse(JobArgs),

    /// Validate an EAC-CPF document against the SNAC profile
    Validate(JobArgs),

    /// Download every constellation listed in an identifier CSV
    Download(DownloadArgs),
}

#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Input file
    pub input: PathBuf,

    /// Where to write the result
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Print the result when the job finishes
    #[arg(long, default_value_t = false)]
    pub display: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Export format: eac-cpf or constellation_json
    #[arg(long)]
    pub format: Option<DownloadFormat>,
}

impl Commands {
    /// Format override for download jobs.
    pub fn download_format(&self) -> Option<DownloadFormat> {
        match self {
            Commands::Download(args) => args.format,
            _ => None,
        }
    }

    pub fn into_request(self) -> JobRequest {
        let (kind, args) = match self {
            Commands::Reconcile(args) => (JobKind::Reconcile, args),
            Commands::Parse(args) => (JobKind::ParseEac, args),
            Commands::Validate(args) => (JobKind::Validate, args),
            Commands::Download(args) => (JobKind::Download, args.job),
        };
        JobRequest {
            kind,
            input: args.input,
            output: args.output,
            display: args.display,
        }
    }
}
