//! teamwatch: live team monitor for supervisors.
//!
//! Keeps an up-to-date roster and message log for one supervisor session,
//! printing a JSON snapshot line whenever the view changes.
//!
//! ## Subcommands
//!
//! - `watch`: Connect to the realtime server and follow the team live
//! - `replay`: Apply a recorded frame log offline and print the final state

mod logging;
mod replay;
mod tcp_transport;
mod watch;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use teamwatch_core::protocol::{parse_login, LoginExchange};

#[derive(Parser)]
#[command(name = "teamwatch")]
#[command(about = "Live team roster and message monitor for supervisors")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.teamwatch/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write logs to a daily-rolling file in this directory instead of stderr
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and follow the team (stdin lines are sent as messages)
    Watch {
        /// JSON file holding the login exchange
        #[arg(long, value_name = "FILE")]
        login: PathBuf,

        /// Server address (host:port), overrides config and TEAMWATCH_SERVER
        #[arg(long)]
        server: Option<String>,
    },

    /// Replay a newline-delimited frame log and print the resulting snapshot
    Replay {
        /// JSON file holding the login exchange
        #[arg(long, value_name = "FILE")]
        login: PathBuf,

        /// Newline-delimited JSON frames
        #[arg(long, value_name = "FILE")]
        events: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let logging_guard = logging::init(cli.log_dir);

    let (name, result) = match cli.command {
        Commands::Watch { login, server } => {
            let options = watch::WatchOptions {
                login,
                server,
                config: cli.config,
            };
            ("watch", watch::run(options))
        }
        Commands::Replay { login, events } => {
            ("replay", replay::run(&login, &events, cli.config))
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "teamwatch {} failed", name);
        // Flush file logs before exiting.
        drop(logging_guard);
        std::process::exit(1);
    }
}

/// Reads a login exchange, bare or wrapped in `{"data": ...}`.
pub(crate) fn read_login(path: &Path) -> Result<LoginExchange, String> {
    let content = fs_err::read_to_string(path)
        .map_err(|err| format!("Failed to read login file: {}", err))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|err| format!("Login file is not valid JSON: {}", err))?;
    parse_login(value).map_err(|err| format!("Invalid login exchange: {}", err))
}
