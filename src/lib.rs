mod models;
pub mod remove;
pub mod report;

use std::path::PathBuf;

use anyhow::Result;

pub use crate::models::*;
pub use crate::remove::{dedup_rows, remove_duplicates};
pub use crate::report::{find_duplicates, find_duplicates_in, ReportError};

pub const DEFAULT_PATH: &str = "../books.csv";

/// Report ISBNs that appear on more than one row of a books CSV.
#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct FindArgs {
    /// CSV file with an `isbn13` column
    #[arg(default_value = DEFAULT_PATH)]
    pub file: PathBuf,
}

/// Rewrite a books CSV keeping only the first row for each ISBN.
#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct RemoveArgs {
    /// CSV file with the ISBN in its second column
    #[arg(default_value = DEFAULT_PATH)]
    pub file: PathBuf,

    /// Write to a temporary file and rename it over FILE
    #[arg(long)]
    pub atomic: bool,
}

/// Logs go to stderr so stdout carries only the report.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Prints the duplicate report. A missing or unreadable file is reported on
/// stdout and is not an error.
pub fn run_find(args: FindArgs) {
    match find_duplicates(&args.file) {
        Ok(report) => print!("{report}"),
        Err(err @ ReportError::NotFound { .. }) => println!("Error: {err}"),
        Err(err) => println!("An error occurred: {err}"),
    }
}

pub fn run_remove(args: RemoveArgs) -> Result<()> {
    let mode = if args.atomic {
        WriteMode::Atomic
    } else {
        WriteMode::InPlace
    };
    remove_duplicates(&args.file, mode)?;
    Ok(())
}
