use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "judgex",
    version,
    about = "Grades programming assignments on a remote online judge"
)]
pub struct Cli {
    /// Configuration file; defaults to config/judgex.toml when present
    #[arg(long, global = true, env = "JUDGEX_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check that the configured judge account is accepted
    Ping,
    /// List the languages the judge supports
    Languages,
    /// Judge and grade the submission described by a job file
    Grade {
        #[arg(long)]
        job: PathBuf,
        /// Use an in-process judge that answers every test case correctly
        #[arg(long)]
        offline: bool,
    },
}
