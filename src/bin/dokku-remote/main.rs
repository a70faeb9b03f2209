//! `dokku-remote`

mod cli;

use std::process::ExitCode;

use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish()
            .init();
    }

    let cli = cli::Cli::from_env();
    cli.exec()
}
