use clap::{ArgAction, Parser};
use dupfinder_core::config::DEFAULT_CHUNK_SIZE;
use dupfinder_core::ScanOptions;
use std::path::PathBuf;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "dupfinder", version)]
#[command(about = "Find byte-identical duplicate files", long_about = None)]
pub struct Cli {
    /// Directory to scan
    pub root: PathBuf,

    /// Bytes read per chunk while hashing
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Skip symbolic links to files instead of hashing their targets
    #[arg(long)]
    pub no_follow_links: bool,

    /// Print the result as JSON on stdout instead of the text report
    #[arg(long)]
    pub json: bool,

    /// Also write `digest,size,path` rows to FILE
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Keep watching the duplicates and report each one as it is removed
    #[arg(long)]
    pub watch: bool,

    /// Do not echo per-file progress lines
    #[arg(short, long)]
    pub quiet: bool,

    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            chunk_size: self.chunk_size,
            follow_file_links: !self.no_follow_links,
        }
    }
}
