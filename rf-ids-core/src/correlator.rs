//! Windowed RF <-> proximity-tag correlation and escalation.
//!
//! Runs independently of the main detection pipeline (see
//! [`crate::pipeline`]): it never blocks on history or detector work, only
//! on its own two input channels.

use uuid::Uuid;

use crate::config::CorrelatorConfig;
use crate::model::{
    AuxiliaryEvent, EventSource, OutboundMessage, ProximityEvent, RecommendedAction, SecurityEvent, ThreatLevel,
};

#[derive(Debug, Clone, PartialEq)]
enum State {
    Idle,
    Armed {
        trigger_event_id: Uuid,
        opened_at: f64,
        deadline: f64,
    },
}

pub struct ProximityCorrelator {
    config: CorrelatorConfig,
    state: State,
}

impl ProximityCorrelator {
    pub fn new(config: CorrelatorConfig) -> Self {
        Self {
            config,
            state: State::Idle,
        }
    }

    /// Feed a just-emitted RF `SecurityEvent`. A `Malicious` (or higher)
    /// event opens or extends a correlation window; anything else passes
    /// through untouched.
    pub fn on_rf_event(&mut self, event: &SecurityEvent) -> Vec<OutboundMessage> {
        if event.threat_level < ThreatLevel::Malicious {
            return Vec::new();
        }

        match &mut self.state {
            State::Idle => {
                let deadline = event.ts + self.config.timeout_s;
                self.state = State::Armed {
                    trigger_event_id: event.event_id,
                    opened_at: event.ts,
                    deadline,
                };
                vec![OutboundMessage::Auxiliary(AuxiliaryEvent::CorrelationActivated {
                    event_id: Uuid::new_v4(),
                    ts: event.ts,
                    rf_trigger_id: event.event_id,
                })]
            }
            State::Armed { deadline, .. } => {
                let extended = event.ts + self.config.timeout_s;
                if extended > *deadline {
                    *deadline = extended;
                }
                Vec::new()
            }
        }
    }

    /// Feed a proximity-tag read. While armed and within the window this
    /// produces a `Critical` correlated event; otherwise it passes through
    /// as a benign NFC-sourced event.
    pub fn on_proximity_event(&mut self, event: &ProximityEvent) -> OutboundMessage {
        match self.state.clone() {
            State::Armed { trigger_event_id, opened_at, deadline } if event.timestamp <= deadline => {
                self.state = State::Idle;
                OutboundMessage::Security(SecurityEvent {
                    event_id: Uuid::new_v4(),
                    ts: event.timestamp,
                    source: EventSource::Correlated,
                    threat_level: ThreatLevel::Critical,
                    signal: None,
                    verdicts: Vec::new(),
                    recommended_action: RecommendedAction::CriticalAlert,
                    rf_trigger_id: Some(trigger_event_id),
                    nfc_uid: Some(event.uid_hex()),
                    time_delta_s: Some(event.timestamp - opened_at),
                })
            }
            _ => OutboundMessage::Security(SecurityEvent {
                event_id: Uuid::new_v4(),
                ts: event.timestamp,
                source: EventSource::Nfc,
                threat_level: ThreatLevel::Benign,
                signal: None,
                verdicts: Vec::new(),
                recommended_action: RecommendedAction::Monitor,
                rf_trigger_id: None,
                nfc_uid: Some(event.uid_hex()),
                time_delta_s: None,
            }),
        }
    }

    /// Poll for a timed-out window; call this periodically (the pipeline
    /// drives it off the correlator task's channel-recv deadline).
    pub fn check_timeout(&mut self, now: f64) -> Option<OutboundMessage> {
        if let State::Armed { trigger_event_id, deadline, .. } = self.state {
            if now >= deadline {
                self.state = State::Idle;
                return Some(OutboundMessage::Auxiliary(AuxiliaryEvent::CorrelationTimeout {
                    event_id: Uuid::new_v4(),
                    ts: now,
                    rf_trigger_id: trigger_event_id,
                }));
            }
        }
        None
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, State::Armed { .. })
    }
}
