//! Command line interface.

use std::{net::IpAddr, path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "jamstats", version, about = "Roller derby scoreboard statistics")]
/// Top-level arguments.
pub struct Cli {
    /// Action to run.
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
/// Available actions.
pub enum Command {
    /// Serve the live dashboard, fed by a scoreboard server or a saved game.
    Serve(ServeArgs),
    /// Convert a scoreboard JSON export into a jam table (.tsv).
    Export {
        /// Scoreboard JSON export.
        input: PathBuf,
        /// Destination .tsv file.
        output: PathBuf,
    },
    /// Print the game summary tables of a scoreboard JSON export.
    Summary {
        /// Scoreboard JSON export.
        input: PathBuf,
        /// Replace skater names with random aliases.
        #[arg(long)]
        anonymize: bool,
    },
}

#[derive(Args, Debug, Default)]
/// Options of the `serve` command; each one overrides the config file.
pub struct ServeArgs {
    /// Scoreboard host.
    #[arg(long)]
    pub host: Option<String>,
    /// Scoreboard port.
    #[arg(long)]
    pub port: Option<u16>,
    /// Connect to the scoreboard with TLS (`wss://`).
    #[arg(long)]
    pub ssl: bool,
    /// Minimum seconds between two published snapshots.
    #[arg(long)]
    pub publish_interval: Option<u64>,
    /// Dashboard listen address.
    #[arg(long)]
    pub bind: Option<IpAddr>,
    /// Dashboard listen port.
    #[arg(long)]
    pub http_port: Option<u16>,
    /// Seconds between dashboard page refreshes.
    #[arg(long)]
    pub autorefresh: Option<u64>,
    /// Replace skater names with random aliases.
    #[arg(long)]
    pub anonymize: bool,
    /// Stop after the first connection ends instead of reconnecting.
    #[arg(long)]
    pub no_reconnect: bool,
    /// Serve a saved scoreboard export instead of connecting to a scoreboard.
    #[arg(long, conflicts_with_all = ["host", "port", "ssl"])]
    pub file: Option<PathBuf>,
}

impl ServeArgs {
    /// Apply the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.scoreboard.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.scoreboard.port = port;
        }
        if self.ssl {
            config.scoreboard.use_ssl = true;
        }
        if let Some(seconds) = self.publish_interval {
            config.publish_interval = Duration::from_secs(seconds);
        }
        if let Some(bind) = self.bind {
            config.bind.set_ip(bind);
        }
        if let Some(port) = self.http_port {
            config.bind.set_port(port);
        }
        if let Some(seconds) = self.autorefresh {
            config.autorefresh_seconds = seconds;
        }
        if self.anonymize {
            config.anonymize = true;
        }
    }
}
