//! CaskKV CLI
//!
//! Operator tool for inspecting and maintaining a CaskKV data directory.

use std::path::PathBuf;
use std::process;

use caskkv::recovery;
use caskkv::{Config, Engine, SyncStrategy};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// CaskKV CLI
#[derive(Parser, Debug)]
#[command(name = "caskkv-cli")]
#[command(about = "CLI for the CaskKV storage engine")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./caskkv_data")]
    data_dir: PathBuf,

    /// Segment size in MB before rotation
    #[arg(short = 's', long, default_value = "64")]
    segment_mb: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List live keys
    Keys,

    /// Rewrite live keys into a single segment
    Compact,

    /// Print engine statistics
    Stats,

    /// Scan every segment without modifying anything
    Verify,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caskkv=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

/// Convert `--segment-mb` to bytes, rejecting sizes that overflow
fn segment_bytes(segment_mb: u64) -> caskkv::Result<u64> {
    segment_mb.checked_mul(1024 * 1024).ok_or_else(|| {
        caskkv::CaskError::Config(format!("segment size of {} MiB is too large", segment_mb))
    })
}

fn run(args: Args) -> caskkv::Result<()> {
    // Verify must not take the lock or truncate anything
    if let Commands::Verify = args.command {
        let (keydir, result) = recovery::verify(&args.data_dir)?;
        println!("segments:      {}", result.segments_scanned);
        println!("records:       {}", result.records_recovered);
        println!("tombstones:    {}", result.tombstones_applied);
        println!("live keys:     {}", keydir.len());
        println!("dead bytes:    {}", result.dead_bytes);
        for scan in result.scans.iter().filter(|s| s.is_torn()) {
            println!(
                "torn segment {}: valid {} of {} bytes",
                scan.segment_id, scan.valid_len, scan.file_len
            );
        }
        return Ok(());
    }

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .max_segment_size(segment_bytes(args.segment_mb)?)
        .sync_strategy(SyncStrategy::EveryWrite)
        .build();
    let mut engine = Engine::open(config)?;

    match args.command {
        Commands::Get { key } => match engine.get(key.as_bytes()) {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            engine.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Keys => {
            for key in engine.keys() {
                println!("{}", String::from_utf8_lossy(key));
            }
        }
        Commands::Compact => {
            let stats = engine.compact()?;
            println!(
                "compacted {} keys into segment {}, reclaimed {} bytes",
                stats.live_keys,
                stats.new_segment_id,
                stats.bytes_reclaimed()
            );
        }
        Commands::Stats => {
            let stats = engine.stats();
            println!("live keys:     {}", stats.live_keys);
            println!("segments:      {}", stats.segment_count);
            println!("active:        {} ({} bytes)", stats.active_segment_id, stats.active_segment_size);
            println!("dead bytes:    {}", stats.dead_bytes);
            println!("total bytes:   {}", stats.total_bytes);
        }
        Commands::Verify => {}
    }

    engine.close()
}
