//! Wires the demux, analyzer, threat engine, correlator, and emitter into
//! three cooperating threads communicating over bounded channels, per the
//! concurrency model: a pipeline task, a correlator task, and the shared
//! (lock-protected) history.
//!
//! CPU-bound analysis is offloaded to a `rayon` worker pool so the pipeline
//! thread's only suspension points are channel receives and offload
//! round-trips, each bounded by `fft_worker_deadline_ms`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::analyzer::SignalAnalyzer;
use crate::config::EngineConfig;
use crate::correlator::ProximityCorrelator;
use crate::counters::PerformanceCounters;
use crate::detectors::{BruteForceDetector, JammingDetector, ReplayDetector};
use crate::emitter::EventEmitter;
use crate::errors::FrameError;
use crate::history::SignalHistory;
use crate::logging::SignalLogger;
use crate::model::{IqFrame, OutboundMessage, ProximityEvent};
use crate::threat_engine::ThreatEngine;

const PROXIMITY_CHANNEL_CAPACITY: usize = 1_024;
const RF_EVENT_CHANNEL_CAPACITY: usize = 1_024;
const CORRELATOR_POLL_INTERVAL_MS: u64 = 250;

/// Handles for a running engine: senders to feed it input, and the shared
/// counters/emitter for read access while it runs.
pub struct EngineHandles {
    pub raw_iq_tx: Sender<Vec<u8>>,
    pub proximity_tx: Sender<ProximityEvent>,
    pub counters: Arc<PerformanceCounters>,
    pub emitter: Arc<EventEmitter>,
    shutdown: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl EngineHandles {
    /// Signal shutdown and join both worker threads. The emitter is left
    /// populated for the caller to drain; the caller owns where the NDJSON
    /// output goes, keeping core processing separate from CLI-side I/O.
    pub fn shutdown_and_join(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        drop(self.raw_iq_tx);
        drop(self.proximity_tx);
        for handle in self.threads {
            let _ = handle.join();
        }
    }
}

/// Spawn the pipeline and correlator threads. `frame_samples` is typically
/// `config.frame_samples()`; it's threaded through explicitly so callers can
/// override it in tests without touching sample-rate math.
pub fn spawn(config: EngineConfig, frame_samples: usize, center_freq_hz: f64) -> EngineHandles {
    let counters = Arc::new(PerformanceCounters::new());
    let history = SignalHistory::new(&config.history);
    let emitter = Arc::new(EventEmitter::new(&config.outbound, counters.clone()));
    let shutdown = Arc::new(AtomicBool::new(false));

    let (raw_iq_tx, raw_iq_rx) = bounded::<Vec<u8>>(RF_EVENT_CHANNEL_CAPACITY);
    let (proximity_tx, proximity_rx) = bounded::<ProximityEvent>(PROXIMITY_CHANNEL_CAPACITY);
    let (rf_event_tx, rf_event_rx) = bounded::<crate::model::SecurityEvent>(RF_EVENT_CHANNEL_CAPACITY);

    let analyzer = SignalAnalyzer::new(config.clone());
    let threat_engine = Arc::new(ThreatEngine::new(
        ReplayDetector::new(config.replay.clone()),
        JammingDetector::new(config.jamming.clone(), config.jamming.baseline_window_s),
        BruteForceDetector::new(config.brute_force.clone()),
        history.clone(),
    ));

    let worker_pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .build()
            .expect("failed to build analysis worker pool"),
    );

    let pipeline_thread = spawn_pipeline_thread(
        raw_iq_rx,
        frame_samples,
        config.sample_rate_hz,
        center_freq_hz,
        analyzer,
        threat_engine,
        emitter.clone(),
        counters.clone(),
        rf_event_tx,
        worker_pool,
        config.fft_worker_deadline_ms,
        shutdown.clone(),
    );

    let correlator_thread = spawn_correlator_thread(
        rf_event_rx,
        proximity_rx,
        emitter.clone(),
        config.correlator.clone(),
        shutdown.clone(),
    );

    EngineHandles {
        raw_iq_tx,
        proximity_tx,
        counters,
        emitter,
        shutdown,
        threads: vec![pipeline_thread, correlator_thread],
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_pipeline_thread(
    raw_iq_rx: Receiver<Vec<u8>>,
    frame_samples: usize,
    sample_rate_hz: f64,
    center_freq_hz: f64,
    analyzer: SignalAnalyzer,
    threat_engine: Arc<ThreatEngine>,
    emitter: Arc<EventEmitter>,
    counters: Arc<PerformanceCounters>,
    rf_event_tx: Sender<crate::model::SecurityEvent>,
    worker_pool: Arc<rayon::ThreadPool>,
    deadline_ms: u64,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("rf-ids-pipeline".into())
        .spawn(move || {
            let mut demux = crate::demux::Demux::new(frame_samples, sample_rate_hz, center_freq_hz);
            let mut logger = SignalLogger::default();

            while let Ok(bytes) = raw_iq_rx.recv() {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                for frame in demux.push_bytes(&bytes) {
                    counters.record_frame_demuxed();
                    process_frame(
                        frame,
                        &analyzer,
                        &threat_engine,
                        &emitter,
                        &counters,
                        &rf_event_tx,
                        &worker_pool,
                        deadline_ms,
                        &mut logger,
                    );
                }
            }
            if let Some(err) = demux.flush() {
                counters.record_frame_dropped_malformed();
                logger.warn("DEMUX", err.to_string());
            }
        })
        .expect("failed to spawn pipeline thread")
}

#[allow(clippy::too_many_arguments)]
fn process_frame(
    frame: IqFrame,
    analyzer: &SignalAnalyzer,
    threat_engine: &ThreatEngine,
    emitter: &EventEmitter,
    counters: &PerformanceCounters,
    rf_event_tx: &Sender<crate::model::SecurityEvent>,
    worker_pool: &rayon::ThreadPool,
    deadline_ms: u64,
    logger: &mut SignalLogger,
) {
    let frame_ts = frame.timestamp;
    let started = Instant::now();

    let result = analyze_with_deadline(analyzer, frame, worker_pool, deadline_ms);

    match result {
        Err(FrameError::WorkerDeadlineExceeded { deadline_ms }) => {
            counters.record_frame_dropped_deadline();
            logger.warn("ANALYZER", format!("frame at ts={frame_ts} exceeded {deadline_ms}ms deadline, dropped"));
        }
        Err(FrameError::EmptyFrame) => {
            counters.record_frame_dropped_short_read();
        }
        Err(FrameError::NonFiniteSample { .. }) => {
            counters.record_frame_dropped_non_finite();
        }
        Err(other) => {
            logger.error("ANALYZER", format!("frame error: {other}"));
        }
        Ok(None) => {}
        Ok(Some(signal)) => {
            counters.record_signal(signal.signal_type);
            if let Some(event) = threat_engine.process(signal, logger) {
                for verdict in &event.verdicts {
                    counters.record_verdict(verdict.kind);
                }
                counters.record_event(event.threat_level);
                let _ = rf_event_tx.try_send(event.clone());
                if let Err(drop) = emitter.enqueue(OutboundMessage::Security(event), logger) {
                    logger.warn("EMITTER", drop.to_string());
                }
            }
        }
    }

    counters.record_frame_latency_ms(started.elapsed().as_secs_f64() * 1_000.0);
}

/// Run `analyzer.analyze` on `worker_pool`, bounded by `deadline_ms`. This is
/// the pipeline's only suspension point that isn't a plain channel receive.
fn analyze_with_deadline(
    analyzer: &SignalAnalyzer,
    frame: IqFrame,
    worker_pool: &rayon::ThreadPool,
    deadline_ms: u64,
) -> Result<Option<crate::model::DetectedSignal>, FrameError> {
    // Re-created per analyzer handle rather than shared: the analyzer is
    // stateless (the signal history it needs lives in the threat engine), so
    // each offloaded call only needs its own config snapshot and the frame.
    let history = SignalHistory::new(&crate::config::HistoryConfig {
        max_size: 1,
        retention_s: 0.0,
    });
    let analyzer = analyzer.clone();
    let (tx, rx) = bounded(1);

    worker_pool.spawn(move || {
        let result = analyzer.analyze(&frame, &history);
        let _ = tx.send(result);
    });

    match rx.recv_timeout(Duration::from_millis(deadline_ms)) {
        Ok(result) => result,
        Err(_) => Err(FrameError::WorkerDeadlineExceeded { deadline_ms }),
    }
}

fn spawn_correlator_thread(
    rf_event_rx: Receiver<crate::model::SecurityEvent>,
    proximity_rx: Receiver<ProximityEvent>,
    emitter: Arc<EventEmitter>,
    config: crate::config::CorrelatorConfig,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("rf-ids-correlator".into())
        .spawn(move || {
            let mut correlator = ProximityCorrelator::new(config);
            let mut logger = SignalLogger::default();
            let poll_interval = Duration::from_millis(CORRELATOR_POLL_INTERVAL_MS);

            loop {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }

                crossbeam::channel::select! {
                    recv(rf_event_rx) -> msg => match msg {
                        Ok(event) => {
                            for out in correlator.on_rf_event(&event) {
                                let _ = emitter.enqueue(out, &mut logger);
                            }
                        }
                        Err(_) => break,
                    },
                    recv(proximity_rx) -> msg => match msg {
                        Ok(proximity) => {
                            let out = correlator.on_proximity_event(&proximity);
                            let _ = emitter.enqueue(out, &mut logger);
                        }
                        Err(_) => break,
                    },
                    default(poll_interval) => {
                        if let Some(out) = correlator.check_timeout(monotonic_now_s()) {
                            let _ = emitter.enqueue(out, &mut logger);
                        }
                    }
                }
            }
        })
        .expect("failed to spawn correlator thread")
}

fn monotonic_now_s() -> f64 {
    use std::sync::OnceLock;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    #[test]
    fn spawn_and_shutdown_cleanly() {
        let config = EngineConfig::default();
        let handles = spawn(config, 256, 433_920_000.0);
        std::thread::sleep(Duration::from_millis(50));
        handles.shutdown_and_join();
    }

    #[test]
    fn feeding_silence_produces_no_events() {
        let mut config = EngineConfig::default();
        config.fft_size = 256;
        let handles = spawn(config, 512, 433_920_000.0);
        let silence = vec![127u8; 1_024];
        handles.raw_iq_tx.send(silence).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        let mut buf = Cursor::new(Vec::new());
        let written = handles.emitter.drain_to(&mut buf).unwrap();
        handles.shutdown_and_join();
        assert_eq!(written, 0);
    }
}
