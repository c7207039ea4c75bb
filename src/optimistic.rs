//! View-model for a relation button (like, follow) that shows the expected
//! result before the server answers.
//!
//! The shown value only becomes the known-good value once the server call
//! succeeds; a failure puts the last known-good value back.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleState {
    /// Showing server truth.
    Committed,
    /// Showing a speculative value while the call is in flight.
    Pending,
    /// The last call failed and the shown value was restored.
    RolledBack,
}

#[derive(Clone, Debug)]
pub struct OptimisticToggle {
    state: ToggleState,
    active: bool,
    count: i64,
    known_active: bool,
    known_count: i64,
}

impl OptimisticToggle {
    pub fn new(active: bool, count: i64) -> Self {
        Self {
            state: ToggleState::Committed,
            active,
            count,
            known_active: active,
            known_count: count,
        }
    }

    pub fn state(&self) -> ToggleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn is_pending(&self) -> bool {
        self.state == ToggleState::Pending
    }

    /// Flips the shown value before the server call. Returns `false`, and
    /// changes nothing, while a previous call is still pending.
    pub fn begin(&mut self) -> bool {
        if self.is_pending() {
            return false;
        }
        self.count += if self.active { -1 } else { 1 };
        self.active = !self.active;
        self.state = ToggleState::Pending;
        true
    }

    /// Resolves the pending call with the server's answer.
    pub fn settle<T, E>(&mut self, outcome: &Result<T, E>) {
        if !self.is_pending() {
            return;
        }
        match outcome {
            Ok(_) => {
                self.known_active = self.active;
                self.known_count = self.count;
                self.state = ToggleState::Committed;
            }
            Err(_) => {
                self.active = self.known_active;
                self.count = self.known_count;
                self.state = ToggleState::RolledBack;
            }
        }
    }
}
