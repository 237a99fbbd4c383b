//! CLI entry point for the evidencias tool.

use anyhow::Result;
use clap::Parser;
use evidencias_core::{ConversionSupport, Normalizer, Pipeline, ServiceConfig, start_server};
use tracing::{debug, info};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match args.command {
        Command::Run(run) => {
            let config = run.pipeline.to_config();
            let conversion = ConversionSupport::probe().resolve(config.convert_files);
            info!(
                input = %run.input.display(),
                output = %run.output.display(),
                conversion,
                "evidencias starting"
            );

            let pipeline = Pipeline::new(config, Normalizer::new(conversion))?;
            let report = pipeline.run(&run.input, &run.output).await?;

            if run.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
        }
        Command::Serve(serve) => {
            let pipeline = serve.pipeline.to_config();
            let conversion_enabled = ConversionSupport::probe().resolve(pipeline.convert_files);
            start_server(ServiceConfig {
                bind: serve.bind,
                pipeline,
                conversion_enabled,
            })
            .await?;
        }
    }

    Ok(())
}
