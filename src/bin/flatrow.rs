//! flatrow: Flatten JSON records into delimited rows
//!
//! Every object member is named by its key, so nested objects become
//! prefixed columns and arrays can be expanded into one row per element.
//!
//! Usage:
//!   # One document from a file, one row to stdout
//!   flatrow order.json
//!
//!   # NDJSON from stdin, one row per line item, with a header
//!   cat orders.jsonl | flatrow --ndjson --expand items --header
//!
//!   # Two-level expansion, tab separated
//!   flatrow --expand items --expand components -d '\t' orders.json
//!
//!   # Statements for loading the rows into MySQL
//!   flatrow --emit create-table --db shop --table order_items --pk id orders.json

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use flatrow::{Encoder, FlattenConfig, JsonRecord, LineBreak, SqlCmd};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Delimited rows
    Rows,
    /// CREATE DATABASE statement
    CreateDb,
    /// CREATE TABLE statement from the first record's columns
    CreateTable,
    /// LOAD DATA statement from the first record's columns
    LoadData,
}

#[derive(Parser, Debug)]
#[command(name = "flatrow")]
#[command(about = "Flatten JSON records into delimited rows", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Process newline-delimited JSON (one record per line)
    #[arg(long)]
    ndjson: bool,

    /// JSON file with a FlattenConfig; flags below override it
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// Field delimiter (default: ","; accepts '\t')
    #[arg(long, short = 'd')]
    delimiter: Option<String>,

    /// Tag key naming the columns (default: "csv")
    #[arg(long)]
    tag: Option<String>,

    /// Terminate rows with \r\n
    #[arg(long)]
    crlf: bool,

    /// Dotted path of an array to expand; repeat for nested levels
    #[arg(long, short = 'e', value_name = "PATH")]
    expand: Vec<String>,

    /// Separator between nested key names (default: none)
    #[arg(long)]
    separator: Option<String>,

    /// Write a header row before the first row
    #[arg(long)]
    header: bool,

    /// What to write
    #[arg(long, value_enum, default_value_t = Emit::Rows)]
    emit: Emit,

    /// Comma-separated keys marked as primary key columns
    #[arg(long)]
    pk: Option<String>,

    /// Database name for statements
    #[arg(long, default_value = "")]
    db: String,

    /// Table name for statements
    #[arg(long)]
    table: Option<String>,

    /// Storage engine for CREATE TABLE
    #[arg(long, default_value = "InnoDB")]
    engine: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;
    let primary_keys: Vec<String> = args
        .pk
        .as_deref()
        .map(|keys| keys.split(',').map(|k| k.trim().to_string()).collect())
        .unwrap_or_default();

    match args.emit {
        Emit::Rows => write_rows(&args, config, &primary_keys),
        Emit::CreateDb => {
            if args.db.is_empty() {
                bail!("--db is required for --emit create-db");
            }
            print!("{}", sql_cmd(&args, &config, String::new()).create_db());
            Ok(())
        }
        Emit::CreateTable | Emit::LoadData => {
            let Some(table) = args.table.clone() else {
                bail!("--table is required for --emit {:?}", args.emit);
            };
            let records = read_records(&args)?;
            let Some(first) = records.first() else {
                bail!("no JSON records found in input");
            };
            let cmd = sql_cmd(&args, &config, table);
            let record = JsonRecord::new(first, &config.tag_key).with_primary_keys(&primary_keys);
            let statement = if args.emit == Emit::CreateTable {
                cmd.create_table(&record)
            } else {
                cmd.load_data(&record)
            }
            .context("Failed to build statement")?;
            print!("{}", statement);
            Ok(())
        }
    }
}

/// Start from the config file (or defaults) and apply flags on top
fn build_config(args: &Args) -> Result<FlattenConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open config: {}", path))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse config: {}", path))?
        }
        None => FlattenConfig::default(),
    };

    if let Some(delimiter) = &args.delimiter {
        config.delimiter = parse_delimiter(delimiter)?;
    }
    if let Some(tag) = &args.tag {
        config.tag_key = tag.clone();
    }
    if args.crlf {
        config.line_break = LineBreak::CrLf;
    }
    if !args.expand.is_empty() {
        config.expand_paths = args.expand.clone();
    }
    if let Some(separator) = &args.separator {
        config.name_separator = separator.clone();
    }

    config.validate().context("Invalid configuration")?;
    debug!(?config, "configuration loaded");
    Ok(config)
}

fn parse_delimiter(raw: &str) -> Result<char> {
    if raw == "\\t" {
        return Ok('\t');
    }
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => bail!("delimiter must be a single character, got {:?}", raw),
    }
}

fn sql_cmd(args: &Args, config: &FlattenConfig, table: String) -> SqlCmd {
    SqlCmd {
        tag_key: config.tag_key.clone(),
        expand_paths: config.expand_paths.clone(),
        db: args.db.clone(),
        engine: args.engine.clone(),
        table,
    }
}

fn write_rows(args: &Args, config: FlattenConfig, primary_keys: &[String]) -> Result<()> {
    let tag_key = config.tag_key.clone();
    let stdout = std::io::stdout();
    let mut encoder = Encoder::with_config(stdout.lock(), config)
        .context("Failed to create encoder")?
        .with_header(args.header);

    let mut records = 0usize;
    let mut rows = 0usize;

    if args.ndjson {
        // Stream line by line so large inputs never sit in memory at once
        let reader = open_input(&args.input)?;
        for (lineno, line) in BufReader::new(reader).lines().enumerate() {
            let line = line.context("Failed to read line")?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)
                .with_context(|| format!("Failed to parse JSON on line {}", lineno + 1))?;
            let record = JsonRecord::new(&value, &tag_key).with_primary_keys(primary_keys);
            rows += encoder
                .encode(&record)
                .with_context(|| format!("Failed to encode record on line {}", lineno + 1))?;
            records += 1;
        }
    } else {
        for (index, value) in read_records(args)?.iter().enumerate() {
            let record = JsonRecord::new(value, &tag_key).with_primary_keys(primary_keys);
            rows += encoder
                .encode(&record)
                .with_context(|| format!("Failed to encode record {}", index))?;
            records += 1;
        }
    }

    encoder.flush().context("Failed to flush output")?;

    if records == 0 {
        warn!("no JSON records found in input");
    }
    info!(records, rows, "done");
    Ok(())
}

fn open_input(input: &Option<String>) -> Result<Box<dyn Read>> {
    Ok(match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input: {}", path))?,
        )),
        None => Box::new(std::io::stdin()),
    })
}

/// Read the whole input: a top-level array is a list of records, any other
/// document is one record, and anything that fails to parse as a single
/// document is retried as NDJSON.
fn read_records(args: &Args) -> Result<Vec<Value>> {
    let mut content = Vec::new();
    open_input(&args.input)?
        .read_to_end(&mut content)
        .context("Failed to read input")?;

    if args.ndjson {
        return parse_lines(&content);
    }

    let mut scratch = content.clone();
    match simd_json::serde::from_slice::<Value>(&mut scratch) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(value) => Ok(vec![value]),
        Err(err) => {
            debug!(%err, "input is not a single JSON document, reading as NDJSON");
            parse_lines(&content)
        }
    }
}

fn parse_lines(content: &[u8]) -> Result<Vec<Value>> {
    String::from_utf8_lossy(content)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Failed to parse JSON record {}", i))
        })
        .collect()
}
