//! Dedupe + rate-limit gate for inbound semantic events. Pure except for the
//! internal bookkeeping maps; the caller supplies `now`.

use std::collections::HashMap;
use std::time::Instant;

use crate::cec::frame::InboundEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Emit,
    Drop,
}

pub struct EventPolicy {
    dedupe_window_s: f64,
    min_interval_s: f64,
    last_seen: HashMap<String, Instant>,
    last_emit_ts: Option<Instant>,
}

impl EventPolicy {
    pub fn new(dedupe_window_s: f64, min_interval_s: f64) -> EventPolicy {
        EventPolicy {
            dedupe_window_s,
            min_interval_s,
            last_seen: HashMap::new(),
            last_emit_ts: None,
        }
    }

    pub fn should_emit(&mut self, event: &InboundEvent, now: Instant) -> Decision {
        let fingerprint = format!("{}:{}:{}", event.source, event.key, event.kind.tag());

        if let Some(&seen) = self.last_seen.get(&fingerprint) {
            if now.saturating_duration_since(seen).as_secs_f64() < self.dedupe_window_s {
                self.last_seen.insert(fingerprint, now);
                return Decision::Drop;
            }
        }

        if let Some(last_emit) = self.last_emit_ts {
            if now.saturating_duration_since(last_emit).as_secs_f64() < self.min_interval_s {
                self.last_seen.insert(fingerprint, now);
                return Decision::Drop;
            }
        }

        self.last_seen.insert(fingerprint, now);
        self.last_emit_ts = Some(now);
        Decision::Emit
    }
}
