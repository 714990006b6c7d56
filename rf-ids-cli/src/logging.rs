//! Operational logging for the CLI process itself — startup, shutdown,
//! periodic counter snapshots. This is distinct from both the core's
//! internal [`rf_ids_core::logging::SignalLogger`] (in-process diagnostic
//! ring buffer) and the NDJSON security-event stream written to stdout.

use crate::config::{LogFormat, LogTarget, LoggingConfig};
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use rf_ids_core::counters::CounterSnapshot;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    Counters(CounterStatsEvent),
    Info { message: String },
    Warn { message: String },
    Error { message: String, details: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterStatsEvent {
    pub timestamp: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub snapshot: CounterSnapshot,
    pub frames_per_sec: f64,
    pub events_per_sec: f64,
}

pub struct StructuredLogger {
    config: LoggingConfig,
    writer: Box<dyn Write + Send>,
    start_time: DateTime<Utc>,
}

impl StructuredLogger {
    pub fn new(config: LoggingConfig) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match &config.target {
            LogTarget::Stdout => Box::new(io::stdout()),
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::File => {
                let path = config
                    .file_path
                    .as_ref()
                    .ok_or_else(|| color_eyre::eyre::eyre!("file path required for file logging target"))?;
                Box::new(BufWriter::new(File::create(path)?))
            }
        };

        Ok(Self {
            config,
            writer,
            start_time: Utc::now(),
        })
    }

    pub fn log(&mut self, event: LogEvent) -> Result<()> {
        let output = match self.config.format {
            LogFormat::Json => self.format_json(&event)?,
            LogFormat::Logfmt => self.format_logfmt(&event),
            LogFormat::Pretty => self.format_pretty(&event),
        };

        writeln!(self.writer, "{output}")?;
        self.writer.flush()?;
        Ok(())
    }

    fn format_json(&self, event: &LogEvent) -> Result<String> {
        Ok(serde_json::to_string(event)?)
    }

    fn format_logfmt(&self, event: &LogEvent) -> String {
        let ts = Utc::now().to_rfc3339();
        match event {
            LogEvent::Counters(c) => format!(
                "ts=\"{}\" type=counters elapsed_secs={:.1} frames_per_sec={:.1} events_per_sec={:.1} frames_demuxed={} events_critical={}",
                ts, c.elapsed_secs, c.frames_per_sec, c.events_per_sec, c.snapshot.frames_demuxed, c.snapshot.events_critical
            ),
            LogEvent::Info { message } => format!("ts=\"{ts}\" level=info msg=\"{message}\""),
            LogEvent::Warn { message } => format!("ts=\"{ts}\" level=warn msg=\"{message}\""),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("ts=\"{ts}\" level=error msg=\"{message}\" details=\"{d}\""),
                None => format!("ts=\"{ts}\" level=error msg=\"{message}\""),
            },
        }
    }

    fn format_pretty(&self, event: &LogEvent) -> String {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        match event {
            LogEvent::Counters(c) => format!(
                "[{}] COUNTERS ({:.1}s): {:.1} frames/s, {:.1} events/s | critical={} malicious={} suspicious={} dropped_backpressure={}",
                ts,
                c.elapsed_secs,
                c.frames_per_sec,
                c.events_per_sec,
                c.snapshot.events_critical,
                c.snapshot.events_malicious,
                c.snapshot.events_suspicious,
                c.snapshot.events_dropped_backpressure
            ),
            LogEvent::Info { message } => format!("[{ts}] INFO: {message}"),
            LogEvent::Warn { message } => format!("[{ts}] WARN: {message}"),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("[{ts}] ERROR: {message} | {d}"),
                None => format!("[{ts}] ERROR: {message}"),
            },
        }
    }

    pub fn elapsed(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1_000.0
    }
}
