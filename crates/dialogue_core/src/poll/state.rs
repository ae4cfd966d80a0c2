use std::fmt;
use std::time::Instant;

/// Polling state owned by the decision loop. Only `start`/`stop` move it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollState {
    #[default]
    Idle,
    Polling {
        /// When the last cycle ran. `None` until the first cycle after start.
        last_cycle: Option<Instant>,
    },
}

impl PollState {
    pub fn is_polling(&self) -> bool {
        matches!(self, PollState::Polling { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            PollState::Idle => "idle",
            PollState::Polling { .. } => "polling",
        }
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
