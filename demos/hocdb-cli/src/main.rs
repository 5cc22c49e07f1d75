//! Demo CLI driving the `hocdb` native Rust API: load a schema from a TOML
//! file, append rows, and run load/query/stats/latest against the dataset.

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use hocdb::{Dataset, DatasetConfig, Field, FieldKind, Filter, FilterValue, Schema};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "hocdb-cli")]
#[command(about = "Append to and query a hocdb dataset from the command line")]
struct Cli {
    /// Ticker (dataset name).
    #[arg(long)]
    ticker: String,

    /// Directory holding the dataset file.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// TOML file describing the schema's fields, in order.
    #[arg(long)]
    schema: PathBuf,

    /// Maximum file size in bytes (0 for the 64 MiB default).
    #[arg(long, default_value_t = 0)]
    max_file_size: u64,

    /// Auto-increment the timestamp instead of requiring monotonic input.
    #[arg(long)]
    auto_increment: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append comma-separated rows read from stdin, one record per line, in
    /// schema field order.
    Append,
    /// Print every live record.
    Load,
    /// Print records in `[start, end)`, optionally filtered by
    /// `field=value` pairs.
    Query {
        #[arg(allow_hyphen_values = true)]
        start: i64,
        #[arg(allow_hyphen_values = true)]
        end: i64,
        #[arg(long = "filter", value_name = "FIELD=VALUE")]
        filters: Vec<String>,
    },
    /// Print min/max/sum/count/mean for a numeric field over `[start, end)`.
    Stats {
        field: String,
        #[arg(allow_hyphen_values = true)]
        start: i64,
        #[arg(allow_hyphen_values = true)]
        end: i64,
    },
    /// Print the newest record's value for a field.
    Latest { field: String },
}

#[derive(Deserialize)]
struct SchemaFile {
    fields: Vec<SchemaFieldFile>,
}

#[derive(Deserialize)]
struct SchemaFieldFile {
    name: String,
    kind: String,
}

fn parse_kind(kind: &str) -> Result<FieldKind> {
    match kind {
        "i64" => Ok(FieldKind::I64),
        "u64" => Ok(FieldKind::U64),
        "f64" => Ok(FieldKind::F64),
        "bool" => Ok(FieldKind::Bool),
        "string" => Ok(FieldKind::String),
        other => bail!("unknown field kind '{other}'"),
    }
}

fn load_schema(path: &PathBuf) -> Result<Schema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading schema file {}", path.display()))?;
    let parsed: SchemaFile = toml::from_str(&text).context("parsing schema TOML")?;
    let fields = parsed
        .fields
        .into_iter()
        .map(|f| Ok(Field::new(f.name, parse_kind(&f.kind)?)))
        .collect::<Result<Vec<_>>>()?;
    Schema::resolve(fields).map_err(|e| anyhow!(e))
}

fn encode_value(kind: FieldKind, raw: &str, out: &mut Vec<u8>) -> Result<()> {
    match kind {
        FieldKind::I64 => out.extend_from_slice(&raw.trim().parse::<i64>()?.to_le_bytes()),
        FieldKind::U64 => out.extend_from_slice(&raw.trim().parse::<u64>()?.to_le_bytes()),
        FieldKind::F64 => out.extend_from_slice(&raw.trim().parse::<f64>()?.to_le_bytes()),
        FieldKind::Bool => out.push(if raw.trim().parse::<bool>()? { 1 } else { 0 }),
        FieldKind::String => {
            let mut slot = [0u8; 128];
            let bytes = raw.trim().as_bytes();
            let n = bytes.len().min(127);
            slot[..n].copy_from_slice(&bytes[..n]);
            out.extend_from_slice(&slot);
        }
    }
    Ok(())
}

fn encode_row(schema: &Schema, line: &str) -> Result<Vec<u8>> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() != schema.fields().len() {
        bail!(
            "expected {} comma-separated values, got {}",
            schema.fields().len(),
            parts.len()
        );
    }
    let mut record = Vec::with_capacity(schema.stride());
    for (field, raw) in schema.fields().iter().zip(parts) {
        encode_value(field.kind, raw, &mut record)?;
    }
    Ok(record)
}

fn parse_filter(schema: &Schema, raw: &str) -> Result<Filter> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("filter '{raw}' is not of the form FIELD=VALUE"))?;
    let index = schema
        .field_index_of(name)
        .ok_or_else(|| anyhow!("no field named '{name}'"))?;
    let kind = schema.kind_of(index).expect("index came from the schema");
    let filter_value = match kind {
        FieldKind::I64 => FilterValue::I64(value.parse()?),
        FieldKind::U64 => FilterValue::U64(value.parse()?),
        FieldKind::F64 => FilterValue::F64(value.parse()?),
        FieldKind::Bool => FilterValue::Bool(value.parse()?),
        FieldKind::String => FilterValue::String(value.to_string()),
    };
    Ok(Filter::new(index, filter_value))
}

fn print_records(schema: &Schema, buf: &[u8]) {
    let stride = schema.stride();
    for record in buf.chunks_exact(stride) {
        let mut fields = Vec::new();
        for (i, field) in schema.fields().iter().enumerate() {
            let offset = schema.offset_of(i).unwrap();
            let text = match field.kind {
                FieldKind::I64 => {
                    i64::from_le_bytes(record[offset..offset + 8].try_into().unwrap()).to_string()
                }
                FieldKind::U64 => {
                    u64::from_le_bytes(record[offset..offset + 8].try_into().unwrap()).to_string()
                }
                FieldKind::F64 => {
                    f64::from_le_bytes(record[offset..offset + 8].try_into().unwrap()).to_string()
                }
                FieldKind::Bool => (record[offset] != 0).to_string(),
                FieldKind::String => {
                    let slot = &record[offset..offset + 128];
                    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
                    String::from_utf8_lossy(&slot[..end]).into_owned()
                }
            };
            fields.push(format!("{}={text}", field.name));
        }
        println!("{}", fields.join(" "));
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let schema = load_schema(&cli.schema)?;
    let config = DatasetConfig {
        max_file_size: cli.max_file_size,
        auto_increment: cli.auto_increment,
        ..DatasetConfig::default()
    };
    let mut dataset = Dataset::open_or_create(&cli.ticker, &cli.dir, schema, config)?;

    match cli.command {
        Commands::Append => {
            let stdin = io::stdin();
            let mut appended = 0usize;
            for line in stdin.lock().lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record = encode_row(dataset.schema(), &line)?;
                dataset.append(&record)?;
                appended += 1;
            }
            dataset.flush()?;
            eprintln!("appended {appended} records");
        }
        Commands::Load => {
            print_records(dataset.schema(), &dataset.load());
        }
        Commands::Query { start, end, filters } => {
            let schema = dataset.schema().clone();
            let parsed_filters = filters
                .iter()
                .map(|f| parse_filter(&schema, f))
                .collect::<Result<Vec<_>>>()?;
            print_records(&schema, &dataset.query(start, end, &parsed_filters));
        }
        Commands::Stats { field, start, end } => {
            let index = dataset
                .field_index_of(&field)
                .ok_or_else(|| anyhow!("no field named '{field}'"))?;
            let stats = dataset.get_stats(start, end, index)?;
            println!(
                "min={} max={} sum={} count={} mean={}",
                stats.min, stats.max, stats.sum, stats.count, stats.mean
            );
        }
        Commands::Latest { field } => {
            let index = dataset
                .field_index_of(&field)
                .ok_or_else(|| anyhow!("no field named '{field}'"))?;
            let (value, ts) = dataset.get_latest(index)?;
            println!("timestamp={ts} value={value}");
        }
    }

    Ok(())
}
