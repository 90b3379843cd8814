//! hbrowse Command-Line Interface
//!
//! Browse the tables of a wide-column store with scans.
//!
//! # Usage
//!
//! ```bash
//! # Start interactive REPL against a dataset
//! hbrowse --dataset demos/users.json
//!
//! # Execute a single statement
//! hbrowse -c "scan users prefix=user: limit=5"
//!
//! # Execute statements from a file
//! hbrowse -f scans.txt
//!
//! # Output as JSON
//! hbrowse -o json -c "scan users"
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hbrowse_client::{Browser, ConnectionSetting, Dataset, MemoryStore};

mod commands;
mod config;
mod formatter;
mod repl;
mod statement;

use config::CliConfig;
use formatter::OutputFormat;
use repl::Repl;

/// hbrowse command-line interface
#[derive(Parser, Debug)]
#[command(
    name = "hbrowse",
    version,
    about = "Command-line browser for wide-column stores",
    long_about = "Browse tables of a wide-column store: list tables and families,\n\
                  and run prefix and key-range scans with paging."
)]
struct Args {
    /// Execute a single statement and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Execute statements from file and exit
    #[arg(short = 'f', long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, env = "HBROWSE_OUTPUT")]
    output: Option<OutputFormatArg>,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Suppress banner (for scripting)
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, value_name = "FILE", env = "HBROWSE_CONFIG")]
    config: Option<PathBuf>,

    /// Connection to open at startup
    #[arg(long, value_name = "NAME", env = "HBROWSE_CONNECTION")]
    connection: Option<String>,

    /// JSON dataset to load into the in-process store
    #[arg(long, value_name = "FILE", env = "HBROWSE_DATASET")]
    dataset: Option<PathBuf>,

    /// Default page size for scans
    #[arg(long, value_name = "N", env = "HBROWSE_PAGE_SIZE")]
    page_size: Option<u64>,
}

/// Output format argument
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    /// Display results in a formatted table
    Table,
    /// Display results as JSON
    Json,
    /// Display results as CSV
    Csv,
    /// Display raw values
    Raw,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Table => OutputFormat::Table,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Csv => OutputFormat::Csv,
            OutputFormatArg::Raw => OutputFormat::Raw,
        }
    }
}

/// Name of the setting used when the configuration defines none.
const LOCAL_CONNECTION: &str = "local";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let config = load_config(&args)?;
    let format = match args.output {
        Some(arg) => arg.into(),
        None => OutputFormat::parse(&config.output_format).with_context(|| {
            format!("unknown output format '{}' in config", config.output_format)
        })?,
    };
    let browser = Browser::new(Arc::new(open_store(config.dataset.as_deref())?));

    let mut repl = Repl::new(config, browser, format)?;
    if let Some(path) = &args.config {
        repl.set_config_path(path);
    }
    if args.command.is_none() && args.file.is_none() && !args.quiet {
        repl.print_banner();
    }
    repl.connect_default(args.connection.as_deref())?;

    if let Some(command) = &args.command {
        info!("Executing command: {}", command);
        for statement in statement::split_statements(command) {
            repl.execute_and_print(&statement)?;
        }
        Ok(())
    } else if let Some(file) = &args.file {
        execute_file(&mut repl, file)
    } else {
        repl.run()
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("hbrowse_cli=debug,hbrowse_client=debug")
    } else {
        EnvFilter::new("hbrowse_cli=warn,hbrowse_client=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn load_config(args: &Args) -> Result<CliConfig> {
    let mut config = if let Some(path) = &args.config {
        CliConfig::from_file(path)?
    } else {
        CliConfig::load_default()?
    };

    if let Some(dataset) = &args.dataset {
        config.dataset = Some(dataset.clone());
    }
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    if config.connections.is_empty() {
        config
            .connections
            .push(ConnectionSetting::new(LOCAL_CONNECTION).quorum("localhost"));
    }

    Ok(config)
}

fn open_store(dataset: Option<&Path>) -> Result<MemoryStore> {
    match dataset {
        Some(path) => {
            let dataset = Dataset::load(path)
                .with_context(|| format!("loading dataset {}", path.display()))?;
            info!("Loaded dataset {} ({} tables)", path.display(), dataset.tables.len());
            Ok(dataset.into_store()?)
        }
        None => {
            warn!("no dataset given, the store is empty");
            Ok(MemoryStore::new())
        }
    }
}

fn execute_file(repl: &mut Repl, path: &Path) -> Result<()> {
    info!("Executing file: {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    for statement in statement::split_statements(&content) {
        repl.execute_and_print(&statement)?;
    }

    Ok(())
}
