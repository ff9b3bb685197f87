//! Uses clap to define the CLI interface declaratively.
use std::path::PathBuf;

use clap::{command, Parser};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// watch list and settings, as a toml or json file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// extra paths to watch for every event
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,
}
