//! Serializes outbound messages to NDJSON and writes them through a bounded
//! queue that never drops `Critical` events.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::config::OutboundConfig;
use crate::counters::PerformanceCounters;
use crate::errors::BackpressureDrop;
use crate::logging::SignalLogger;
use crate::model::{OutboundMessage, ThreatLevel};

/// Bounded outbound queue. `Critical` events are pushed to the front and are
/// never dropped while the queue has capacity for anything; non-critical
/// events are dropped from the oldest end when the queue is full.
pub struct EventEmitter {
    queue: Arc<Mutex<VecDeque<OutboundMessage>>>,
    capacity: usize,
    counters: Arc<PerformanceCounters>,
}

impl EventEmitter {
    pub fn new(config: &OutboundConfig, counters: Arc<PerformanceCounters>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::with_capacity(config.queue_capacity))),
            capacity: config.queue_capacity,
            counters,
        }
    }

    /// Enqueue a message for writing. Returns `Err` only to report a
    /// backpressure drop; the emitter otherwise never fails.
    pub fn enqueue(&self, message: OutboundMessage, logger: &mut SignalLogger) -> Result<(), BackpressureDrop> {
        let mut queue = self.queue.lock().expect("emitter queue lock poisoned");
        let is_critical = message.threat_level() == Some(ThreatLevel::Critical);

        if queue.len() >= self.capacity {
            if is_critical {
                // Make room by dropping the oldest non-critical entry, if any.
                if let Some(pos) = queue.iter().position(|m| m.threat_level() != Some(ThreatLevel::Critical)) {
                    queue.remove(pos);
                } else {
                    // Queue is full of criticals; drop the oldest one rather
                    // than grow unbounded.
                    queue.pop_front();
                }
            } else {
                self.counters.record_backpressure_drop();
                let (event_id, threat_level) = describe(&message);
                logger.warn("EMITTER", format!("dropping event {event_id} (threat_level={threat_level}) due to backpressure"));
                return Err(BackpressureDrop::EventDropped { event_id, threat_level });
            }
        }

        if is_critical {
            queue.push_front(message);
        } else {
            queue.push_back(message);
        }
        Ok(())
    }

    /// Drain and serialize everything currently queued as NDJSON lines.
    pub fn drain_to<W: Write>(&self, writer: &mut W) -> std::io::Result<usize> {
        let mut queue = self.queue.lock().expect("emitter queue lock poisoned");
        let mut written = 0;
        while let Some(message) = queue.pop_front() {
            let line = serde_json::to_string(&message).expect("SecurityEvent always serializes");
            writeln!(writer, "{line}")?;
            written += 1;
        }
        Ok(written)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().expect("emitter queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn describe(message: &OutboundMessage) -> (String, String) {
    match message {
        OutboundMessage::Security(e) => (e.event_id.to_string(), format!("{:?}", e.threat_level)),
        OutboundMessage::Auxiliary(a) => (format!("{a:?}"), "n/a".to_string()),
    }
}
