use std::fmt;

/// Lifecycle of a single controller operation.
///
/// `Idle -> Pending -> Committed | RolledBack`. Failures are terminal; a
/// retry is a new operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpState {
    Idle,
    /// Local mutation (if any) applied, request in flight.
    Pending,
    Committed,
    RolledBack,
}

impl OpState {
    pub fn can_advance_to(self, next: OpState) -> bool {
        matches!(
            (self, next),
            (OpState::Idle, OpState::Pending)
                | (OpState::Pending, OpState::Committed)
                | (OpState::Pending, OpState::RolledBack)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OpState::Committed | OpState::RolledBack)
    }
}

/// Tracks one operation and logs its transitions.
#[derive(Debug)]
pub(crate) struct Operation {
    kind: &'static str,
    target: String,
    state: OpState,
}

impl Operation {
    pub(crate) fn start(kind: &'static str, target: impl fmt::Display) -> Self {
        Self {
            kind,
            target: target.to_string(),
            state: OpState::Idle,
        }
    }

    pub(crate) fn advance(&mut self, next: OpState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(
            op = self.kind,
            target = %self.target,
            from = ?self.state,
            to = ?next,
            "operation transition"
        );
        self.state = next;
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> OpState {
        self.state
    }
}
