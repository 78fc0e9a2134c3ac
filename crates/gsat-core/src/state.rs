//! Worker state machine states

/// Serial worker state
///
/// Created with the worker, mutated only by the worker loop, discarded when
/// the worker terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// Not servicing a connection (before open, or an anomaly while open)
    #[default]
    Idle,
    /// Port open, reading inbound data
    Running,
    /// A transport failure was reported; no further I/O is attempted
    Aborted,
}

impl WorkerState {
    /// True once transport activity has been abandoned
    pub fn is_aborted(&self) -> bool {
        matches!(self, WorkerState::Aborted)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "Idle"),
            WorkerState::Running => write!(f, "Running"),
            WorkerState::Aborted => write!(f, "Aborted"),
        }
    }
}
