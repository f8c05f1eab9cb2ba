use std::fs::File;
use std::io::{self, Read};
use std::process;
use std::time::{Duration, Instant};

use clap::Parser;
use regex::Regex;
use tracing::error;

use vedirect_stream_logger::parser::DEFAULT_BUFFER_LIMIT;
use vedirect_stream_logger::{PointBuilder, RecordIterator, StreamParser, TelemetryRecord};

#[derive(Parser)]
#[command(
    name = "vedirect-logger",
    about = "Decode VE.Direct telemetry streams and emit records or InfluxDB line protocol"
)]
struct Cli {
    /// Serial device nodes or dump files to read (- for stdin, default: stdin)
    files: Vec<String>,

    /// Emit InfluxDB line protocol on a cadence instead of one summary per record
    #[arg(long)]
    influx: bool,

    /// Line-protocol measurement name
    #[arg(
        long,
        value_name = "NAME",
        env = "INFLUX_MEASUREMENT",
        default_value = "vedirect"
    )]
    measurement: String,

    /// Seconds between line-protocol points (first record is emitted immediately)
    #[arg(
        long,
        value_name = "SECS",
        env = "UPLOAD_INTERVAL",
        default_value_t = 60
    )]
    interval: u64,

    /// Discard buffered bytes beyond this size when no frame resolves
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_LIMIT)]
    buffer_limit: usize,

    /// Keep only records whose field matches (NAME=REGEX), repeatable
    #[arg(short = 'f', long = "field", value_name = "NAME=REGEX")]
    field: Vec<String>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

struct FieldFilters {
    fields: Vec<(String, Regex)>,
}

impl FieldFilters {
    fn matches(&self, record: &TelemetryRecord) -> bool {
        self.fields.iter().all(|(name, re)| {
            record
                .get(name)
                .map(|value| re.is_match(value))
                .unwrap_or(false)
        })
    }
}

fn compile_filters(cli: &Cli) -> FieldFilters {
    let mut fields = Vec::new();
    for spec in &cli.field {
        let eq = match spec.find('=') {
            Some(pos) => pos,
            None => {
                eprintln!("invalid field filter '{spec}': expected NAME=REGEX");
                process::exit(2);
            }
        };
        let name = spec[..eq].to_string();
        let re = match Regex::new(&spec[eq + 1..]) {
            Ok(re) => re,
            Err(e) => {
                eprintln!("invalid field {name} regex: {e}");
                process::exit(2);
            }
        };
        fields.push((name, re));
    }
    FieldFilters { fields }
}

fn open_input(files: &[String]) -> Box<dyn Read> {
    if files.is_empty() || (files.len() == 1 && files[0] == "-") {
        return Box::new(io::stdin().lock());
    }

    let mut readers: Vec<Box<dyn Read>> = Vec::new();
    for path in files {
        if path == "-" {
            readers.push(Box::new(io::stdin().lock()));
        } else {
            match File::open(path) {
                Ok(f) => readers.push(Box::new(f)),
                Err(e) => {
                    eprintln!("{path}: {e}");
                    process::exit(1);
                }
            }
        }
    }

    if readers.len() == 1 {
        return readers.remove(0);
    }

    let mut chain: Box<dyn Read> = readers.remove(0);
    for r in readers {
        chain = Box::new(chain.chain(r));
    }
    chain
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .with_writer(io::stderr)
        .init();
}

fn format_summary(record: &TelemetryRecord) -> String {
    let mut pairs: Vec<_> = record.iter().collect();
    pairs.sort_by_key(|&(k, _)| k);
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn run_records(reader: Box<dyn Read>, cli: &Cli, filters: &FieldFilters) {
    let parser = StreamParser::with_buffer_limit(cli.buffer_limit);
    for result in RecordIterator::with_parser(reader, parser) {
        match result {
            Ok(record) => {
                if filters.matches(&record) {
                    println!("{}", format_summary(&record));
                }
            }
            Err(e) => {
                error!("read error: {e}");
                break;
            }
        }
    }
}

fn run_influx(reader: Box<dyn Read>, cli: &Cli, filters: &FieldFilters) {
    let builder = PointBuilder::new(&cli.measurement);
    let parser = StreamParser::with_buffer_limit(cli.buffer_limit);
    let cadence = Duration::from_secs(cli.interval);
    let mut last_emit: Option<Instant> = None;

    for result in RecordIterator::with_parser(reader, parser) {
        match result {
            Ok(record) => {
                if !filters.matches(&record) {
                    continue;
                }
                // First record goes out immediately, then at most one
                // point per cadence interval.
                let due = match last_emit {
                    None => true,
                    Some(at) => at.elapsed() >= cadence,
                };
                if !due {
                    continue;
                }
                if let Some(point) = builder.point(&record) {
                    println!("{point}");
                    last_emit = Some(Instant::now());
                }
            }
            Err(e) => {
                error!("read error: {e}");
                break;
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let filters = compile_filters(&cli);
    let reader = open_input(&cli.files);

    if cli.influx {
        run_influx(reader, &cli, &filters);
    } else {
        run_records(reader, &cli, &filters);
    }
}
