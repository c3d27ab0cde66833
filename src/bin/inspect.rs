//! histkv Archive Inspector
//!
//! Prints archive metadata and dumps points or frames from an archive file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args as ClapArgs, Parser, Subcommand};
use histkv::diagnostics::{LogReporter, Logger, VerboseLevel};
use histkv::filters::{MatchFilter, PointIdFilter, SeekFilter, TimestampFilter, ValueFilter};
use histkv::storage::{ArchiveFile, MemoryArchive, ReaderOptions};
use histkv::{
    merge_to_frames, open_point_stream, Config, HistError, HistorianKey, HistorianValue, Result,
};
use tracing_subscriber::{fmt, EnvFilter};

/// histkv archive inspector
#[derive(Parser, Debug)]
#[command(name = "histkv-inspect")]
#[command(about = "Inspect histkv archive files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print header metadata
    Meta {
        /// Archive file
        path: PathBuf,
    },

    /// Recompute and check the data checksum
    Verify {
        /// Archive file
        path: PathBuf,
    },

    /// Dump matching points, one per line
    Points {
        /// Archive file
        path: PathBuf,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Dump matching points grouped by timestamp
    Frames {
        /// Archive file
        path: PathBuf,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Write a synthetic archive (sine waves, one per point)
    Generate {
        /// Output file
        path: PathBuf,

        /// Number of points
        #[arg(short, long, default_value = "8")]
        points: u64,

        /// Samples per point
        #[arg(short, long, default_value = "1000")]
        samples: u64,

        /// Ticks between samples
        #[arg(short, long, default_value = "10000000")]
        interval: u64,

        /// Records per compressed block
        #[arg(short, long, default_value = "256")]
        block: u32,
    },
}

#[derive(ClapArgs, Debug)]
struct QueryArgs {
    /// First timestamp (inclusive)
    #[arg(long)]
    start: Option<u64>,

    /// Last timestamp (inclusive)
    #[arg(long)]
    stop: Option<u64>,

    /// Comma-separated point ids
    #[arg(long, value_delimiter = ',')]
    points: Vec<u64>,

    /// Drop values whose quality shares a bit with this mask
    #[arg(long)]
    exclude_quality: Option<u32>,

    /// Stop after this many records
    #[arg(long)]
    limit: Option<u64>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,histkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let logger = Logger::new();
    let reporter = logger.reporter("histkv-inspect");
    let errors = logger.subscribe(VerboseLevel::ERROR | VerboseLevel::FATAL);

    if let Err(e) = run(args.command) {
        report_failure(&reporter, "command failed", &e, &mut std::io::stderr());
        for message in errors.drain() {
            eprintln!("error: {}: {}", message.event_name, message.message);
        }
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Meta { path } => {
            let archive = ArchiveFile::open(&path)?;
            let meta = archive.meta();
            println!("path:              {}", path.display());
            println!("entries:           {}", meta.entry_count);
            println!("blocks:            {}", meta.block_count);
            println!("records per block: {}", archive.records_per_block());
            println!("encoding:          {:?}/{:?}", meta.encoding.key, meta.encoding.value);
            println!("first key:         {}", format_key(meta.first_key));
            println!("last key:          {}", format_key(meta.last_key));
            Ok(())
        }
        Commands::Verify { path } => {
            let archive = ArchiveFile::open(&path)?;
            archive.verify()?;
            println!("{}: ok ({} entries)", path.display(), archive.entry_count());
            Ok(())
        }
        Commands::Points { path, query } => {
            let mut stream = open_query(&path, &query)?;
            let mut count = 0u64;
            while stream.read()? {
                let key = stream.current_key();
                let value = stream.current_value();
                println!(
                    "{}\t{}\t{}\t{:#010x}",
                    key.timestamp, key.point_id, value.value, value.quality
                );
                count += 1;
            }
            tracing::info!(count, "Dumped points");
            Ok(())
        }
        Commands::Frames { path, query } => {
            let mut stream = open_query(&path, &query)?;
            let frames = merge_to_frames(&mut stream)?;
            for (timestamp, frame) in &frames {
                let cells: Vec<String> = frame
                    .iter()
                    .map(|(point_id, value)| format!("{}={}", point_id, value.value))
                    .collect();
                println!("{}\t{}", timestamp, cells.join(" "));
            }
            Ok(())
        }
        Commands::Generate {
            path,
            points,
            samples,
            interval,
            block,
        } => {
            let config = Config::builder().records_per_block(block).build()?;
            let archive = MemoryArchive::new();
            for sample in 0..samples {
                let timestamp = sample * interval;
                archive.extend((0..points).map(|point_id| {
                    let phase = sample as f64 / 50.0 + point_id as f64;
                    (
                        HistorianKey::new(timestamp, point_id),
                        HistorianValue::new(phase.sin() * 100.0, 0),
                    )
                }));
            }
            let meta = archive.flush_to(&path, &config)?;
            println!(
                "{}: wrote {} entries in {} blocks",
                path.display(),
                meta.entry_count,
                meta.block_count
            );
            Ok(())
        }
    }
}

fn open_query(path: &Path, query: &QueryArgs) -> Result<histkv::PointStream> {
    let archive = ArchiveFile::open(path)?;

    let seek = match (query.start, query.stop) {
        (None, None) => SeekFilter::All,
        (start, stop) => TimestampFilter::from_range(start.unwrap_or(0), stop.unwrap_or(u64::MAX))?.into(),
    };
    let key_match = if query.points.is_empty() {
        MatchFilter::All
    } else {
        PointIdFilter::from_list(query.points.iter().copied()).into()
    };
    let value_match = match query.exclude_quality {
        Some(mask) => ValueFilter::exclude_quality(mask).into(),
        None => Default::default(),
    };
    let mut options = ReaderOptions::default();
    if let Some(limit) = query.limit {
        options = options.with_max_return_count(limit);
    }
    let config = Config::builder().reader_options(options).build()?;

    open_point_stream(&archive, &config.reader_options, seek, key_match, value_match)
}

/// Routes a command failure through the reporter, writing to `out` directly
/// when the reporter itself refuses the message.
fn report_failure<W: Write>(reporter: &LogReporter, event_name: &str, err: &HistError, out: &mut W) {
    if let Err(report_err) =
        reporter.error(event_name, &err.to_string(), Some(err as &dyn std::error::Error))
    {
        let _ = writeln!(out, "error: {}", err);
        let _ = writeln!(out, "error: failed to report error: {}", report_err);
    }
}

fn format_key(key: Option<HistorianKey>) -> String {
    key.map_or_else(|| "-".to_string(), |key| key.to_string())
}
