//! Internal structured logging for the detection pipeline.
//!
//! This is diagnostic logging only; it is entirely separate from the NDJSON
//! security-event stream produced by [`crate::emitter`], which is the
//! pipeline's product output, not a log.

use std::fmt;

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,

    /// Per-subsystem enable flags, grouped the way the pipeline stages are.
    pub enable_dsp: bool,
    pub enable_detectors: bool,
    pub enable_correlator: bool,
    pub enable_io: bool,

    /// Ring-buffer size; oldest entries are evicted past this.
    pub max_entries: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_dsp: true,
            enable_detectors: true,
            enable_correlator: true,
            enable_io: true,
            max_entries: 1_000,
        }
    }
}

impl LogConfig {
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            max_entries: 5_000,
            ..Default::default()
        }
    }

    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Warn,
            enable_dsp: false,
            max_entries: 100,
            ..Default::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            level: LogLevel::Error,
            enable_dsp: false,
            enable_detectors: false,
            enable_correlator: false,
            enable_io: false,
            max_entries: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub subsystem: &'static str,
    pub message: String,
}

/// Collects structured log entries for a single pipeline instance.
#[derive(Debug, Clone)]
pub struct SignalLogger {
    config: LogConfig,
    entries: Vec<LogEntry>,
}

impl SignalLogger {
    pub fn new(config: LogConfig) -> Self {
        let capacity = config.max_entries.min(1_000);
        Self {
            config,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn log(&mut self, level: LogLevel, subsystem: &'static str, message: impl fmt::Display) {
        if level < self.config.level {
            return;
        }

        let enabled = match subsystem {
            "DEMUX" | "SPECTRUM" | "ANALYZER" => self.config.enable_dsp,
            "REPLAY" | "JAMMING" | "BRUTE_FORCE" | "THREAT" => self.config.enable_detectors,
            "CORRELATOR" => self.config.enable_correlator,
            "IO" | "EMITTER" => self.config.enable_io,
            _ => true,
        };

        if !enabled {
            return;
        }

        let entry = LogEntry {
            level,
            subsystem,
            message: message.to_string(),
        };

        if self.config.max_entries > 0 {
            if self.entries.len() >= self.config.max_entries {
                self.entries.remove(0);
            }
            self.entries.push(entry);
        }

        #[cfg(any(test, debug_assertions))]
        {
            eprintln!("[{}] {}: {}", level, subsystem, message);
        }
    }

    pub fn trace(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Trace, subsystem, message);
    }

    pub fn debug(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Debug, subsystem, message);
    }

    pub fn info(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Info, subsystem, message);
    }

    pub fn warn(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Warn, subsystem, message);
    }

    pub fn error(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Error, subsystem, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn entries_for_subsystem(&self, subsystem: &str) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.subsystem == subsystem)
            .collect()
    }

    pub fn entries_at_level(&self, level: LogLevel) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.level >= level).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SignalLogger {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl fmt::Display for SignalLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "[{}] {}: {}", entry.level, entry.subsystem, entry.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_level() {
        let mut logger = SignalLogger::new(LogConfig {
            level: LogLevel::Info,
            ..Default::default()
        });

        logger.trace("ANALYZER", "trace");
        logger.debug("ANALYZER", "debug");
        logger.info("ANALYZER", "info");
        logger.warn("ANALYZER", "warn");

        assert_eq!(logger.entries().len(), 2);
    }

    #[test]
    fn filters_by_subsystem() {
        let mut logger = SignalLogger::new(LogConfig {
            level: LogLevel::Debug,
            enable_dsp: false,
            ..Default::default()
        });

        logger.info("ANALYZER", "dsp message");
        logger.info("CORRELATOR", "correlator message");

        assert_eq!(logger.entries().len(), 1);
        assert_eq!(logger.entries()[0].subsystem, "CORRELATOR");
    }

    #[test]
    fn evicts_oldest_past_max_entries() {
        let mut logger = SignalLogger::new(LogConfig {
            level: LogLevel::Debug,
            max_entries: 3,
            ..Default::default()
        });

        for i in 0..4 {
            logger.info("THREAT", format!("message {i}"));
        }

        assert_eq!(logger.entries().len(), 3);
        assert!(logger.entries()[0].message.contains("message 1"));
    }
}
