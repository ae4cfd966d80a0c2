use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which confirm input the advancer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceInput {
    #[default]
    PrimaryClick,
    Space,
    Enter,
}

impl AdvanceInput {
    pub fn label(self) -> &'static str {
        match self {
            AdvanceInput::PrimaryClick => "click",
            AdvanceInput::Space => "space",
            AdvanceInput::Enter => "enter",
        }
    }
}

impl fmt::Display for AdvanceInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AdvanceInput {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "click" | "primary_click" => Ok(AdvanceInput::PrimaryClick),
            "space" => Ok(AdvanceInput::Space),
            "enter" => Ok(AdvanceInput::Enter),
            _ => Err(format!(
                "unknown advance input '{raw}' (expected click|space|enter)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvanceError {
    #[error("input backend rejected {input} press: {reason}")]
    Rejected { input: AdvanceInput, reason: String },
    #[error("input backend unavailable: {0}")]
    Unavailable(String),
}

/// Input-injection seam. One call produces one press-and-release.
pub trait Advancer {
    fn advance(&mut self) -> Result<(), AdvanceError>;

    /// Runs on every `Idle -> Polling` transition, before any advance.
    fn prepare(&mut self) -> Result<(), AdvanceError> {
        Ok(())
    }
}

/// Counts calls; optionally fails them.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingAdvancer {
    pub(crate) advances: u32,
    pub(crate) prepares: u32,
    pub(crate) fail_next: u32,
}

#[cfg(test)]
impl Advancer for RecordingAdvancer {
    fn advance(&mut self) -> Result<(), AdvanceError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(AdvanceError::Unavailable("scripted failure".to_string()));
        }
        self.advances += 1;
        Ok(())
    }

    fn prepare(&mut self) -> Result<(), AdvanceError> {
        self.prepares += 1;
        Ok(())
    }
}
