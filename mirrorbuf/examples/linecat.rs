use clap::Parser;
use eyre::{Result, WrapErr};
use mirrorbuf::{Config, Mode, RingBuffer};
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "linecat")]
#[command(about = "Copy stdin to stdout through a mirrorbuf ring buffer", long_about = None)]
struct Args {
    #[arg(short, long, help = "configuration file path (toml format)")]
    config: Option<PathBuf>,

    #[arg(short = 's', long, help = "buffer capacity in bytes, rounded up to pages")]
    capacity: Option<usize>,

    #[arg(short, long, value_parser = parse_mode, help = "byte, string or stream")]
    mode: Option<Mode>,

    #[arg(short, long, help = "record terminator for stream mode")]
    terminator: Option<char>,
}

fn parse_mode(mode: &str) -> Result<Mode, String> {
    match mode.to_lowercase().as_str() {
        "byte" => Ok(Mode::Byte),
        "string" => Ok(Mode::String),
        "stream" => Ok(Mode::Stream),
        _ => Err(format!(
            "Invalid mode: {}. Valid options: byte, string, stream",
            mode
        )),
    }
}

fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config {
            mode: Mode::Stream,
            ..Config::default()
        },
    };
    if let Some(capacity) = args.capacity {
        config.capacity = capacity;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(terminator) = args.terminator {
        config.terminator =
            u8::try_from(terminator).wrap_err("terminator must be a single-byte character")?;
    }
    Ok(config)
}

fn has_record(buffer: &RingBuffer) -> bool {
    match buffer.mode() {
        Mode::Byte => !buffer.is_empty(),
        Mode::String => buffer.readable().contains(&0),
        Mode::Stream => buffer.readable().contains(&buffer.terminator()),
    }
}

/// Emits every complete result and returns how many there were.
fn drain(buffer: &mut RingBuffer, out: &mut impl Write, scratch: &mut [u8]) -> Result<usize> {
    let mut results = 0;
    while has_record(buffer) {
        let n = buffer.read(scratch)?;
        match buffer.mode() {
            Mode::Byte => out.write_all(&scratch[..n])?,
            // Strings come back with their NUL, records without a terminator.
            Mode::String => writeln!(out, "{}", String::from_utf8_lossy(&scratch[..n - 1]))?,
            Mode::Stream => writeln!(out, "{}", String::from_utf8_lossy(&scratch[..n]))?,
        }
        results += 1;
    }

    if buffer.is_full() {
        // A record longer than the buffer can never complete.
        warn!(capacity = buffer.capacity(), "record exceeds capacity, flushing raw");
        flush_raw(buffer, out)?;
    }
    Ok(results)
}

fn flush_raw(buffer: &mut RingBuffer, out: &mut impl Write) -> Result<()> {
    out.write_all(buffer.readable())?;
    let len = buffer.occupancy();
    buffer.consume(len);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    debug!(?args, "linecat arguments");

    let config = resolve_config(&args)?;
    let mut buffer = config.open().wrap_err("failed to open ring buffer")?;
    info!(capacity = buffer.capacity(), mode = ?buffer.mode(), "buffer ready");

    let mut stdin = io::stdin().lock();
    let mut stdout = BufWriter::new(io::stdout().lock());
    let mut scratch = vec![0u8; buffer.capacity()];
    let mut results = 0;

    loop {
        let string_mode = buffer.mode() == Mode::String;
        let free = buffer.writable();
        let n = stdin.read(free)?;
        if n == 0 {
            break;
        }
        if string_mode {
            free[..n]
                .iter_mut()
                .filter(|b| **b == b'\n')
                .for_each(|b| *b = 0);
        }
        buffer.commit(n);
        results += drain(&mut buffer, &mut stdout, &mut scratch)?;
    }

    // Whatever is left never saw a terminator.
    if !buffer.is_empty() {
        flush_raw(&mut buffer, &mut stdout)?;
    }
    stdout.flush()?;

    info!(
        results = results,
        bytes = buffer.write_count(),
        "input exhausted"
    );

    if let Err(err) = buffer.close() {
        warn!(error = %err, "failed to release ring buffer");
    }
    Ok(())
}
