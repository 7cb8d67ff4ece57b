use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::sink::SinkBackendKind;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkBackend {
    Csv,
    Jsonl,
    Parquet,
}

impl From<SinkBackend> for SinkBackendKind {
    fn from(value: SinkBackend) -> Self {
        match value {
            SinkBackend::Csv => SinkBackendKind::Csv,
            SinkBackend::Jsonl => SinkBackendKind::Jsonl,
            SinkBackend::Parquet => SinkBackendKind::Parquet,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Carve records from a raw memory image
    Scan(ScanArgs),
    /// Clean a record table and summarize its findings
    Reduce(ReduceArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Input memory image (raw dump)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory; each run writes into `<output>/<run_id>/`
    #[arg(short, long, default_value = "./output")]
    pub output: PathBuf,

    /// Optional path to config file (YAML)
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// Number of worker threads (1 scans on the main thread)
    #[arg(long, default_value_t = num_cpus::get())]
    pub workers: usize,

    /// Window size, in MiB (overrides config when set)
    #[arg(long)]
    pub chunk_size_mib: Option<u64>,

    /// Window overlap, in bytes (overrides config when set)
    #[arg(long)]
    pub overlap_bytes: Option<u64>,

    /// Minimum candidate string length (overrides config when set)
    #[arg(long)]
    pub min_len: Option<usize>,

    /// Skip the UTF-16LE scan
    #[arg(long)]
    pub no_utf16: bool,

    /// Do not emit unclassified strings
    #[arg(long)]
    pub no_strings: bool,

    /// Record table format
    #[arg(long, value_enum, default_value_t = SinkBackend::Csv)]
    pub sink: SinkBackend,
}

#[derive(Args, Debug)]
pub struct ReduceArgs {
    /// Raw record table (.csv or .jsonl)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory for the clean and findings tables (defaults to the input's)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Optional path to config file (YAML)
    #[arg(long)]
    pub config_path: Option<PathBuf>,
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}
