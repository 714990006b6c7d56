mod config;
mod logging;
mod telemetry;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;

use config::{CliConfig, LogLevel};
use logging::{LogEvent, StructuredLogger};
use rf_ids_core::model::ProximityEvent;
use telemetry::CounterSampler;

const IQ_CHUNK_BYTES: usize = 65_536;
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Real-time RF intrusion-detection pipeline for automotive key-fob and TPMS signals",
    long_about = None
)]
struct Cli {
    /// Path to a TOML configuration file overriding engine defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a raw interleaved-u8 IQ byte stream; defaults to stdin.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Path to a proximity-tag event stream: one `timestamp_s hex_uid` per line.
    #[arg(short, long)]
    proximity: Option<PathBuf>,

    /// Center frequency in Hz; overrides the config file value.
    #[arg(short = 'f', long)]
    center_freq_hz: Option<f64>,

    /// Enable verbose (debug-level) operational logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let mut config = match &args.config {
        Some(path) => {
            CliConfig::from_file(path).wrap_err_with(|| format!("failed to load config from {}", path.display()))?
        }
        None => CliConfig::default(),
    };
    if let Some(freq) = args.center_freq_hz {
        config.center_freq_hz = freq;
    }
    if args.verbose {
        config.terminal.logging.level = LogLevel::Debug;
    }

    let mut logger = StructuredLogger::new(config.terminal.logging.clone())?;
    logger.log(LogEvent::Info {
        message: format!(
            "rf-ids-cli starting: sample_rate_hz={} center_freq_hz={} fft_size={}",
            config.engine.sample_rate_hz, config.center_freq_hz, config.engine.fft_size
        ),
    })?;

    let frame_samples = config.engine.frame_samples();
    let shutdown_drain_ms = config.engine.outbound.shutdown_drain_ms;
    let handles = rf_ids_core::pipeline::spawn(config.engine.clone(), frame_samples, config.center_freq_hz);

    let emitter = handles.emitter.clone();
    let counters = handles.counters.clone();

    let iq_reader = spawn_iq_reader(args.input.clone(), handles.raw_iq_tx.clone());
    let proximity_reader = args
        .proximity
        .clone()
        .map(|path| spawn_proximity_reader(path, handles.proximity_tx.clone()));

    let mut sampler = CounterSampler::new(counters, config.terminal.counter_interval_secs);
    let stdout = std::io::stdout();

    while !iq_reader.is_finished() {
        drain_and_log(&emitter, &mut logger, &stdout)?;
        if let Some(event) = sampler.sample() {
            logger.log(LogEvent::Counters(event))?;
        }
        std::thread::sleep(IDLE_POLL_INTERVAL);
    }

    let _ = iq_reader.join();
    if let Some(reader) = proximity_reader {
        let _ = reader.join();
    }

    // Give in-flight frames a chance to finish analysis before tearing the
    // pipeline down, matching the configured drain deadline.
    std::thread::sleep(Duration::from_millis(shutdown_drain_ms));
    handles.shutdown_and_join();

    drain_and_log(&emitter, &mut logger, &stdout)?;
    logger.log(LogEvent::Info {
        message: "rf-ids-cli shut down cleanly".into(),
    })?;

    Ok(())
}

fn drain_and_log(
    emitter: &rf_ids_core::emitter::EventEmitter,
    logger: &mut StructuredLogger,
    stdout: &std::io::Stdout,
) -> Result<()> {
    let mut out = stdout.lock();
    if let Err(e) = emitter.drain_to(&mut out) {
        logger.log(LogEvent::Error {
            message: "failed writing NDJSON output".into(),
            details: Some(e.to_string()),
        })?;
    }
    Ok(())
}

/// Stream raw IQ bytes from `path` (or stdin if `None`) into the pipeline in
/// fixed-size chunks until EOF, then drop the sender so the pipeline's demux
/// loop observes channel closure.
fn spawn_iq_reader(path: Option<PathBuf>, tx: crossbeam::channel::Sender<Vec<u8>>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("rf-ids-iq-reader".into())
        .spawn(move || {
            let mut reader: Box<dyn Read> = match &path {
                Some(p) => Box::new(std::fs::File::open(p).expect("failed to open IQ input file")),
                None => Box::new(std::io::stdin()),
            };

            let mut buf = vec![0u8; IQ_CHUNK_BYTES];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        })
        .expect("failed to spawn IQ reader thread")
}

/// Stream proximity-tag reads from `path`, one `timestamp_s hex_uid` pair per
/// line, into the pipeline until EOF.
fn spawn_proximity_reader(path: PathBuf, tx: crossbeam::channel::Sender<ProximityEvent>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("rf-ids-proximity-reader".into())
        .spawn(move || {
            let file = match std::fs::File::open(&path) {
                Ok(f) => f,
                Err(_) => return,
            };
            for line in BufReader::new(file).lines() {
                let Ok(line) = line else { break };
                let Some(event) = parse_proximity_line(&line) else { continue };
                if tx.send(event).is_err() {
                    break;
                }
            }
        })
        .expect("failed to spawn proximity reader thread")
}

fn parse_proximity_line(line: &str) -> Option<ProximityEvent> {
    let mut parts = line.split_whitespace();
    let timestamp: f64 = parts.next()?.parse().ok()?;
    let hex = parts.next()?;
    let uid = hex_to_bytes(hex)?;
    Some(ProximityEvent { timestamp, uid })
}

fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_proximity_line() {
        let event = parse_proximity_line("12.5 0a1b2c3d").unwrap();
        assert_eq!(event.timestamp, 12.5);
        assert_eq!(event.uid, vec![0x0a, 0x1b, 0x2c, 0x3d]);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_proximity_line("not_a_number 0a1b").is_none());
        assert!(parse_proximity_line("12.5 xyz").is_none());
        assert!(parse_proximity_line("12.5").is_none());
    }
}
