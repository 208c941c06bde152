use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Prerequisite-aware tutor over a concept graph.
#[derive(Parser, Debug)]
#[command(name = "tutor", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start an interactive tutoring session (the default).
    Chat,
    /// Extract concepts and prerequisites from a text file into the graph.
    Ingest {
        /// File with study material, or `-` to read standard input.
        path: PathBuf,
    },
}

impl Cli {
    /// The requested subcommand, `chat` when none was given.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Chat)
    }
}
