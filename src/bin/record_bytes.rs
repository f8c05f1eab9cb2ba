use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use tracing::{debug, info};

#[derive(Parser)]
#[command(
    name = "vedirect-record-bytes",
    about = "Record raw VE.Direct stream bytes with timestamps for offline replay"
)]
struct Cli {
    /// Serial device node or file to read (- for stdin, default: stdin)
    input: Option<String>,

    /// Directory for the per-run log file
    #[arg(
        long,
        value_name = "DIR",
        env = "RECORD_OUTPUT_DIR",
        default_value = "vedirect_logs"
    )]
    output_dir: PathBuf,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
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

fn open_input(input: Option<&str>) -> Box<dyn Read> {
    match input {
        None | Some("-") => Box::new(io::stdin().lock()),
        Some(path) => match File::open(path) {
            Ok(f) => Box::new(f),
            Err(e) => {
                eprintln!("{path}: {e}");
                process::exit(1);
            }
        },
    }
}

fn unix_timestamp() -> (u64, u32) {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs(), d.subsec_micros()),
        Err(_) => (0, 0),
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn run(mut reader: Box<dyn Read>, log: &mut BufWriter<File>) -> io::Result<()> {
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(());
        }
        let (secs, micros) = unix_timestamp();
        debug!(bytes = n, "received chunk");
        writeln!(log, "{secs}.{micros:06}\t{}", hex(&chunk[..n]))?;
        log.flush()?;
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = fs::create_dir_all(&cli.output_dir) {
        eprintln!("{}: {e}", cli.output_dir.display());
        process::exit(1);
    }

    let (secs, _) = unix_timestamp();
    let path = cli.output_dir.join(format!("vedirect_bytes_{secs}.txt"));
    let file = match File::options().append(true).create(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            process::exit(1);
        }
    };
    let mut log = BufWriter::new(file);
    info!(path = %path.display(), "recording raw bytes");

    let reader = open_input(cli.input.as_deref());
    if let Err(e) = run(reader, &mut log) {
        eprintln!("read error: {e}");
        process::exit(1);
    }
}
