//! crucible-map: Map nested records into flat rows
//!
//! Usage:
//!   # Read from file, write JSON Lines to stdout
//!   crucible-map --config tags.json data.json
//!
//!   # Read NDJSON from stdin, write CSV
//!   cat events.jsonl | crucible-map --config events.json --ndjson --format csv
//!
//!   # Override the record path from the configuration
//!   crucible-map --config orders.json --array-path "payload/orders" data.json

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use crucible::input::parse_payload;
use crucible::mapping::{
    validate_minimum_records, CsvRowWriter, JsonLinesWriter, MappingPlan, MessageLog, RecordMapper, Row,
};
use crucible::ImportConfig;
use log::{info, LevelFilter};
use std::fs::File;
use std::io::{BufReader, Read};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Jsonl,
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "crucible-map")]
#[command(about = "Map nested records into flat rows", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Mapping configuration (JSON with "general" and "columns")
    #[arg(long, short = 'c')]
    config: String,

    /// Process newline-delimited JSON (one record per line)
    #[arg(long)]
    ndjson: bool,

    /// Path selecting the records inside the payload
    #[arg(long)]
    array_path: Option<String>,

    /// Separator for --array-path (default: "/")
    #[arg(long)]
    separator: Option<String>,

    /// Fail when fewer rows than this are produced
    #[arg(long)]
    minimum_records: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "jsonl")]
    format: Format,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Build config, command line flags win over the file
    let mut config = ImportConfig::from_path(&args.config)
        .with_context(|| format!("Failed to load configuration: {}", args.config))?;
    if let Some(path) = args.array_path {
        config.general.array_path = Some(path);
    }
    if let Some(sep) = args.separator {
        config.general.array_path_separator = Some(sep);
    }
    if let Some(minimum) = args.minimum_records {
        config.general.minimum_records = Some(minimum);
    }

    let plan = MappingPlan::compile(&config.columns, &config.general).context("Invalid mapping configuration")?;

    let mut content = Vec::new();
    let mut reader = if let Some(file_path) = &args.input {
        Box::new(BufReader::new(File::open(file_path)?)) as Box<dyn Read>
    } else {
        Box::new(std::io::stdin()) as Box<dyn Read>
    };
    reader.read_to_end(&mut content).context("Failed to read input")?;

    let payload = parse_payload(&mut content, args.ndjson)?;
    let result = RecordMapper::new().map_with_plan(&payload, &plan)?;
    info!("{}", result.summary());

    let mut log = MessageLog::new();
    if !validate_minimum_records(&result.rows, &config.general, &mut log) {
        bail!("Validation failed, no rows written");
    }

    write_rows(&result.rows, args.format)
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    match verbose {
        0 => {
            // RUST_LOG still applies when no flag is given
            if std::env::var_os("RUST_LOG").is_none() {
                builder.filter_level(LevelFilter::Warn);
            }
        }
        1 => {
            builder.filter_level(LevelFilter::Info);
        }
        _ => {
            builder.filter_level(LevelFilter::Debug);
        }
    }
    builder.init();
}

fn write_rows(rows: &[Row], format: Format) -> Result<()> {
    let stdout = std::io::stdout().lock();
    match format {
        Format::Jsonl => {
            let mut writer = JsonLinesWriter::new(stdout);
            writer.write_rows(rows)?;
            writer.flush()?;
        }
        Format::Csv => {
            let mut writer = CsvRowWriter::new(stdout);
            writer.write_rows(rows)?;
            writer.flush()?;
        }
    }
    Ok(())
}
