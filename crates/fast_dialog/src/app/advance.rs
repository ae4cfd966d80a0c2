use dialogue_core::{AdvanceError, AdvanceInput, Advancer};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct AdvanceEvent<'a> {
    event: &'a str,
    seq: u64,
    input: AdvanceInput,
}

/// Advancer that records each press as a log line and an event for
/// control-port clients. Real input injection plugs in behind the same trait.
#[derive(Debug)]
pub(crate) struct LoggingAdvancer {
    input: AdvanceInput,
    seq: u64,
    pending_events: Vec<String>,
}

impl LoggingAdvancer {
    pub(crate) fn new(input: AdvanceInput) -> Self {
        Self {
            input,
            seq: 0,
            pending_events: Vec::new(),
        }
    }

    pub(crate) fn drain_events_into(&mut self, out: &mut Vec<String>) {
        out.append(&mut self.pending_events);
    }

    fn push_event(&mut self, event: &str) {
        self.seq = self.seq.saturating_add(1);
        let payload = AdvanceEvent {
            event,
            seq: self.seq,
            input: self.input,
        };
        match serde_json::to_string(&payload) {
            Ok(line) => self.pending_events.push(line),
            Err(error) => warn!(error = %error, "advance_event_encode_failed"),
        }
    }
}

impl Advancer for LoggingAdvancer {
    fn advance(&mut self) -> Result<(), AdvanceError> {
        info!(input = %self.input, "advance_input_injected");
        self.push_event("advance");
        Ok(())
    }

    fn prepare(&mut self) -> Result<(), AdvanceError> {
        info!(input = %self.input, "advance_input_mode_forced");
        self.push_event("prepare");
        Ok(())
    }
}
