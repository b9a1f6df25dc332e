//! Rootstage CLI - stage bootable filesystem image manifests
//!
//! Entry point for the rootstage command-line application.

use anyhow::Result;
use clap::Parser;

use rootstage::cli::output::display_error;
use rootstage::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output_config = cli.output_config();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(output_config.level().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Fatal manifest errors get extra guidance from display_error
    match cli.run() {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
