//! CLI command definitions and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "taskgrid",
    about = "Distributed task orchestration core: priority scheduling, LLM fallback, and remote slave execution",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the master: orchestrator HTTP API, LLM fallback manager, slave manager.
    Serve,

    /// Run a slave agent: the authenticated remote execution HTTP surface.
    SlaveAgent {
        /// Host to bind the slave agent's HTTP server to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to bind the slave agent's HTTP server to
        #[arg(long, default_value_t = 7700)]
        port: u16,

        /// Bearer token clients must present
        #[arg(long, env = "SLAVE_TOKEN")]
        token: String,
    },

    /// Register a slave host with a running master.
    RegisterSlave {
        /// Master orchestrator base URL
        #[arg(long)]
        master: String,

        host: String,
        port: u16,

        #[arg(long, env = "SLAVE_TOKEN")]
        token: String,

        #[arg(long, default_value = "native")]
        install_method: String,
    },
}
