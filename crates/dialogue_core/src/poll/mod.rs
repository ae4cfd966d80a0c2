mod advance;
mod decision;
mod decision_loop;
mod state;
mod stats;

pub use advance::{AdvanceError, AdvanceInput, Advancer};
pub use decision::{decide, AdvanceReason, Decision};
pub use decision_loop::{AdvanceStatus, CycleOutcome, PollingDecisionLoop};
pub use state::PollState;
pub use stats::{PollStatsSnapshot, PollTotals};
