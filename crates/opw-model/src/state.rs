use serde::{Deserialize, Serialize};

/// Observable lifecycle of a slot.
///
/// Transitions are monotonic: `Empty` → `Running` → `Settled`. A slot
/// never re-enters an earlier state, in particular a failed settlement
/// is permanent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettleState {
    /// No accessor has triggered the computation yet.
    Empty,
    /// Exactly one accessor owns execution; everyone else waits.
    Running,
    /// Execution finished with a result or a captured failure.
    Settled,
}

impl SettleState {
    /// Short symbolic identifier, for logging and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            SettleState::Empty => "empty",
            SettleState::Running => "running",
            SettleState::Settled => "settled",
        }
    }
}
