//! Command line arguments.

use clap::{ArgAction, Args, Parser};
use std::path::PathBuf;

/// What the client does in this run. Exactly one mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Upload,
    Delete,
    Get,
    CreateApikey,
    DisplayVersion,
    DisplayHistory,
}

#[derive(Debug, Parser)]
#[command(
    name = "fb",
    about = "Upload/nopaste file(s)/stdin to paste.xinu.at and copy URL(s) to clipboard.",
    disable_version_flag = true
)]
pub struct Cli {
    #[command(flatten)]
    pub switches: Switches,

    /// Use different config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short = 'D', long)]
    pub debug: bool,

    /// Upload a tar file containing all files (and directories)
    #[arg(short, long, help_heading = "Upload options")]
    pub tar: bool,

    /// Create a multipaste
    #[arg(short, long, help_heading = "Upload options")]
    pub multipaste: bool,

    /// File name to use for upload when reading from stdin
    #[arg(short, long, default_value = "stdin", help_heading = "Upload options")]
    pub name: String,

    /// Compress the file being uploaded with gz, or xz if given twice
    #[arg(short, long, action = ArgAction::Count)]
    pub compress: u8,

    #[arg(value_name = "file|dir|id://ID|URL")]
    pub args: Vec<String>,
}

#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct Switches {
    /// Delete the IDs
    #[arg(short, long)]
    pub delete: bool,

    /// Download the IDs and output on stdout (use with care!)
    #[arg(short, long)]
    pub get: bool,

    /// Upload files/stdin (default)
    #[arg(short, long)]
    pub upload: bool,

    /// Create a new api key
    #[arg(short = 'a', long)]
    pub create_apikey: bool,

    /// Display the client version
    #[arg(short, long)]
    pub version: bool,

    /// Display an upload history
    #[arg(short = 'H', long)]
    pub history: bool,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        let s = &self.switches;
        if s.delete {
            Mode::Delete
        } else if s.get {
            Mode::Get
        } else if s.create_apikey {
            Mode::CreateApikey
        } else if s.version {
            Mode::DisplayVersion
        } else if s.history {
            Mode::DisplayHistory
        } else {
            Mode::Upload
        }
    }
}
