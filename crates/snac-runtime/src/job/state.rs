//! Job lifecycle states.

use serde::Serialize;

/// Where a job is in its lifecycle.
///
/// `Idle -> Reading -> (Querying -> Awaiting -> Interpreting -> Emitting)* -> Finalizing -> Done`,
/// with `Failed` reachable from `Reading`, the exchange states, `Emitting`
/// and `Finalizing`. Batch jobs loop back to `Querying` for every record,
/// including after a per-record failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Reading,
    Querying,
    Awaiting,
    Interpreting,
    Emitting,
    Finalizing,
    Done,
    Failed,
}

impl JobState {
    /// Whether `next` may follow this state.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;

        match (self, next) {
            (Idle, Reading) => true,
            (Reading, Querying | Interpreting | Finalizing | Failed) => true,
            (Querying, Awaiting | Querying | Finalizing) => true,
            (Awaiting, Interpreting | Querying | Finalizing | Failed) => true,
            (Interpreting, Emitting | Querying | Finalizing | Failed) => true,
            (Emitting, Querying | Finalizing | Failed) => true,
            (Finalizing, Done | Failed) => true,
            _ => false,
        }
    }
}
