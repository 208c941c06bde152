//! Tutor Host Library Crate
//!
//! Configuration, prompt loading, command-line definition and the interactive
//! turn loop. The `tutor` binary is a thin wrapper around this library.

pub mod cli;
pub mod config;
pub mod prompts;
pub mod repl;
