//! CLI argument definitions using clap derive macros.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use evidencias_core::pipeline::{DEFAULT_OUTPUT_DIR, PipelineConfig};
use evidencias_core::server::DEFAULT_BIND;
use evidencias_core::{DEFAULT_MAX_RETRIES, DEFAULT_WORKERS};

/// Download and normalize session evidence listed in CSV/spreadsheet manifests.
///
/// Every row names a group, a session and up to three file URLs (attendance
/// sheet, start photo, end photo). Files are organized per manifest and group,
/// and HEIC photos and PDF documents are converted to JPEG.
#[derive(Parser, Debug)]
#[command(name = "evidencias")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// What to do.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process every manifest in a folder once
    Run(RunArgs),
    /// Serve the upload API
    Serve(ServeArgs),
}

/// Arguments of `evidencias run`.
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Folder containing .csv/.xlsx/.xls/.xlsm/.ods manifests
    pub input: PathBuf,

    /// Output folder
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Arguments of `evidencias serve`.
#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Pipeline tuning shared by both subcommands.
#[derive(clap::Args, Debug)]
pub struct PipelineArgs {
    /// Parallel downloads (1-64)
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS as u8, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub workers: u8,

    /// Retries after the first attempt for transient failures (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Per-request timeout in seconds (1-600)
    #[arg(short = 't', long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout: u64,

    /// Keep HEIC and PDF files as downloaded
    #[arg(long)]
    pub no_convert: bool,
}

impl PipelineArgs {
    /// Builds the pipeline configuration these flags describe.
    #[must_use]
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            workers: usize::from(self.workers),
            request_timeout: Duration::from_secs(self.timeout),
            max_retries: u32::from(self.max_retries),
            convert_files: !self.no_convert,
            ..PipelineConfig::default()
        }
    }
}
