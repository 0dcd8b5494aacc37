//! Command-line surface for the `backplane` binary.

use clap::{Args, Parser, Subcommand};

pub mod output;

#[derive(Parser, Debug)]
#[command(name = "backplane", about = "Developer-productivity backplane: memory layer + sprint daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the sprint daemon main loop (default when no subcommand is given).
    Run(RunArgs),
    /// Fetch `get_state()` from the running daemon over IPC.
    Status,
    /// Call IPC `stop()` on the running daemon (flips `manually_started` off).
    Stop,
    /// Call IPC `list_issues()` on the running daemon.
    List(ListArgs),
    /// One-shot Memory Interface access; does not require a running daemon.
    Memory(MemoryArgs),
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[arg(long)]
    pub dbus: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub actionable: Option<bool>,
}

#[derive(Args, Debug)]
pub struct MemoryArgs {
    #[command(subcommand)]
    pub command: MemoryCommand,
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommand {
    Query {
        text: String,
        #[arg(long = "source")]
        sources: Vec<String>,
        #[arg(long)]
        include_slow: bool,
    },
    Search {
        text: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long = "source")]
        sources: Vec<String>,
        #[arg(long)]
        include_slow: bool,
    },
    Store {
        key: String,
        value: String,
        #[arg(long)]
        source: Option<String>,
    },
    Learn {
        text: String,
        #[arg(long, default_value = "general")]
        category: String,
        #[arg(long)]
        context: Option<String>,
    },
    LearnIntent {
        query: String,
        correct_intent: String,
        #[arg(long = "source")]
        correct_sources: Vec<String>,
    },
}
