// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Read-only notifications about printer, job and configuration changes,
// fanned out over a tokio broadcast channel.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use druckwerk_core::types::{JobId, JobState, PrinterState};

/// Events kept per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    PrinterStateChanged {
        printer: String,
        state: PrinterState,
        reasons: Vec<&'static str>,
    },
    JobStateChanged {
        printer: String,
        job_id: JobId,
        state: JobState,
        message: Option<String>,
    },
    /// A printer was added, deleted, paused or resumed.
    PrinterConfigChanged { printer: String },
}

/// Sending half shared by the system and its printers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: Event) {
        trace!(?event, "event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_see_published_events() {
        let bus = EventBus::new();
        bus.publish(Event::PrinterConfigChanged {
            printer: "nobody listening".into(),
        });

        let mut rx = bus.subscribe();
        bus.publish(Event::JobStateChanged {
            printer: "lp".into(),
            job_id: JobId(3),
            state: JobState::Pending,
            message: None,
        });
        match rx.try_recv().expect("event") {
            Event::JobStateChanged { job_id, state, .. } => {
                assert_eq!(job_id, JobId(3));
                assert_eq!(state, JobState::Pending);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_string(&Event::PrinterConfigChanged {
            printer: "lp".into(),
        })
        .expect("serialize");
        assert_eq!(json, r#"{"event":"printer-config-changed","printer":"lp"}"#);
    }
}
