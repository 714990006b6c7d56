//! Structured error types for the RF intrusion-detection pipeline.

use thiserror::Error;

/// Top-level error type for all engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("internal invariant violated: {0}")]
    Internal(#[from] InternalInvariantError),

    #[error("backpressure drop: {0}")]
    Backpressure(#[from] BackpressureDrop),
}

/// Errors reading or writing the inbound/outbound streams.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read from inbound stream: {reason}")]
    ReadFailed { reason: String },

    #[error("failed to write to outbound stream: {reason}")]
    WriteFailed { reason: String },

    #[error("inbound stream closed unexpectedly")]
    StreamClosed,
}

/// Errors in a single IQ frame or extracted signal; always recoverable by
/// dropping the offending item and continuing.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed IQ byte length: {byte_len} bytes (odd count)")]
    MalformedLength { byte_len: usize },

    #[error("short read at end of stream: expected {expected} samples, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("non-finite value encountered in frame at sample {index}")]
    NonFiniteSample { index: usize },

    #[error("empty frame")]
    EmptyFrame,

    #[error("FFT worker exceeded deadline of {deadline_ms} ms")]
    WorkerDeadlineExceeded { deadline_ms: u64 },
}

/// Configuration errors; always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid sample rate: {rate_hz} Hz (must be > 0)")]
    InvalidSampleRate { rate_hz: f64 },

    #[error("fft_size {size} is not a power of two")]
    InvalidFftSize { size: usize },

    #[error("invalid threshold for {field}: {value} (must be within {valid_range})")]
    InvalidThreshold {
        field: &'static str,
        value: f64,
        valid_range: &'static str,
    },

    #[error("failed to parse configuration file: {reason}")]
    ParseFailed { reason: String },

    #[error("history.max_size must be > 0")]
    InvalidHistorySize,
}

/// A violated internal invariant, such as a non-monotonic timestamp.
#[derive(Debug, Error)]
pub enum InternalInvariantError {
    #[error("timestamps out of order: previous {previous}, got {current}")]
    NonMonotonicTimestamp { previous: f64, current: f64 },

    #[error("history entry count {count} exceeds configured max_size {max_size}")]
    HistoryOverCapacity { count: usize, max_size: usize },

    #[error("correlator observed more than one active window")]
    DoubleArmedCorrelator,
}

/// Signals that an item was dropped due to outbound backpressure. Never fatal.
#[derive(Debug, Error)]
pub enum BackpressureDrop {
    #[error("outbound queue full, dropped event {event_id} (threat_level={threat_level})")]
    EventDropped {
        event_id: String,
        threat_level: String,
    },
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
