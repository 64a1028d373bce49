//! minidb command-line interface.
//!
//! ```bash
//! # Interactive shell over ./data
//! minidb
//!
//! # One-shot statement
//! minidb -c "SELECT * FROM users"
//!
//! # Run a script
//! minidb -f schema.sql
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use minidb_common::DatabaseConfig;
use minidb_engine::Database;

mod formatter;
mod repl;

use repl::Repl;

/// Embedded SQL shell for minidb databases.
#[derive(Parser, Debug)]
#[command(name = "minidb", version, about = "minidb interactive SQL shell")]
struct Args {
    /// Data directory holding the catalog, log, and table files.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Page size in bytes for table files.
    #[arg(long, default_value_t = 4096)]
    page_size: usize,

    /// Cached pages per table.
    #[arg(long, default_value_t = 64)]
    cache_pages: usize,

    /// NUMA node count (0 probes the environment and platform).
    #[arg(long, default_value_t = 0)]
    numa_nodes: usize,

    /// Worker threads pinned to each NUMA node.
    #[arg(long, default_value_t = 2)]
    threads_per_node: usize,

    /// Execute a single statement and exit.
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Execute statements from a file and exit.
    #[arg(short = 'f', long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short = 'v', long)]
    verbose: bool,
}

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

    let config = DatabaseConfig::new(&args.data_dir)
        .with_page_size(args.page_size)
        .with_cache_pages(args.cache_pages)
        .with_numa_nodes(args.numa_nodes)
        .with_threads_per_node(args.threads_per_node);
    let db = Database::open(config).context("failed to open database")?;

    let repl = Repl::new();
    let outcome = if let Some(sql) = &args.command {
        repl.execute_script(&db, sql);
        Ok(())
    } else if let Some(path) = &args.file {
        let script = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        repl.execute_script(&db, &script);
        Ok(())
    } else {
        repl.run(&db)
    };

    db.close().context("failed to close database")?;
    outcome
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("minidb=debug,minidb_engine=debug,minidb_storage=debug,minidb_wal=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}
