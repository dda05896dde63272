//! Command line surface of the `readygate` binary.

use crate::config::GateConfig;
use crate::engine_state::EngineState;
use crate::error::ApiError;
use crate::replay::{run_script, Script};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "readygate", version, about = "Replay state-gated call scripts")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable logging
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a script and print what executed
    Replay {
        script: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve every submission in a script without running it
    Check { script: PathBuf },
    /// List engine states and their readiness ranks
    States,
}

/// Execute a parsed command and return what should be printed.
pub fn run(cli: &Cli, config: &GateConfig) -> Result<String, ApiError> {
    match &cli.command {
        Commands::Replay { script, json } => {
            let script = Script::load(script)?;
            let report = run_script(&script, &config.queue);
            if *json {
                serde_json::to_string_pretty(&report)
                    .map_err(|e| ApiError::ScriptError(format!("Failed to encode report: {}", e)))
            } else {
                Ok(report.render_text())
            }
        }
        Commands::Check { script: path } => {
            let script = Script::load(path)?;
            let problems = script.check();
            if problems.is_empty() {
                Ok(format!("{}: {} step(s) OK\n", path.display(), script.steps.len()))
            } else {
                Err(ApiError::ScriptError(problems.join("\n")))
            }
        }
        Commands::States => {
            let mut out = String::new();
            for state in EngineState::ALL {
                out.push_str(&format!("{:<16} {}\n", state, state.rank()));
            }
            Ok(out)
        }
    }
}
