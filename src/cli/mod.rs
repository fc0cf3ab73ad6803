//! CLI argument parsing types.
//!
//! This module provides the command-line interface structure for the mockfeed binary.

use std::net::IpAddr;

use clap::{Parser, Subcommand};

use crate::config::{MockServerConfig, DEFAULT_WARNING_HEADER};

/// Standalone mock package registry.
#[derive(Parser, Debug)]
#[command(name = "mockfeed", about = "Mock package registry for client testing", version)]
pub struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true, default_value = "false")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a mock feed until interrupted.
    Serve {
        /// Interface to listen on.
        #[arg(long, env = "MOCKFEED_HOST", default_value = "127.0.0.1")]
        host: IpAddr,

        /// Fixed base path instead of a random one (e.g. `/feed`).
        #[arg(long, env = "MOCKFEED_BASE_PATH")]
        base_path: Option<String>,

        /// Header carrying server warnings.
        #[arg(long, env = "MOCKFEED_WARNING_HEADER", default_value = DEFAULT_WARNING_HEADER)]
        warning_header: String,

        /// Warning to send on every matched response. Repeatable.
        #[arg(long = "warning")]
        warnings: Vec<String>,
    },
}

impl Command {
    /// Server configuration for `serve`.
    pub fn config(&self) -> MockServerConfig {
        match self {
            Self::Serve {
                host,
                base_path,
                warning_header,
                ..
            } => MockServerConfig {
                host: *host,
                warning_header: warning_header.clone(),
                base_path: base_path.clone(),
            },
        }
    }
}
