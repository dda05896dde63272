//! Readygate CLI Binary
//!
//! Replays scripted engine lifecycles against the state-gated queue.

use clap::Parser;
use readygate::cli::{run, Cli};
use readygate::config::ConfigLoader;
use readygate::logging::init_logging;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if !cli.quiet {
        if let Err(e) = init_logging(Some(&config.logging)) {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    }

    info!(command = ?cli.command, "readygate starting");

    match run(&cli, &config) {
        Ok(output) => {
            info!("Command completed successfully");
            print!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}
