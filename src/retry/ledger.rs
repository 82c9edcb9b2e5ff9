//! Retry scopes and their attempt counters.

use serde::Serialize;
use std::fmt;

/// A category of failure with its own retry counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    /// The network link is unusable.
    Connection,
    /// A destination file could not be opened or written.
    FileOpen,
}

impl Scope {
    /// Both scopes, in ledger order.
    pub const ALL: [Scope; 2] = [Scope::Connection, Scope::FileOpen];

    /// Body of the retry prompt.
    pub fn message(self) -> &'static str {
        match self {
            Scope::Connection => "The connection has failed",
            Scope::FileOpen => "File failed to open",
        }
    }

    /// Body of the informational prompt shown once the scope gives up.
    pub fn final_message(self) -> &'static str {
        match self {
            Scope::Connection => "The app could not re-establish a connection, and will exit",
            Scope::FileOpen => {
                "The app could not open the necessary file needed to update the list data, and will exit"
            }
        }
    }

    /// camelCase tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Connection => "connection",
            Scope::FileOpen => "fileOpen",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Scope::Connection => 0,
            Scope::FileOpen => 1,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-scope failure counters, capped at `max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryLedger {
    counts: [u32; 2],
    max: u32,
}

impl RetryLedger {
    pub fn new(max: u32) -> Self {
        Self { counts: [0; 2], max }
    }

    /// The cap shared by every scope.
    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn get(&self, scope: Scope) -> u32 {
        self.counts[scope.index()]
    }

    /// Whether another prompt may still be offered for `scope`.
    pub fn has_remaining(&self, scope: Scope) -> bool {
        self.get(scope) < self.max
    }

    /// Count one more failure, returning the new value.
    ///
    /// Saturates at the cap.
    pub fn increment(&mut self, scope: Scope) -> u32 {
        let count = &mut self.counts[scope.index()];
        *count = (*count + 1).min(self.max);
        *count
    }

    pub fn reset(&mut self, scope: Scope) {
        self.counts[scope.index()] = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_is_capped() {
        let mut ledger = RetryLedger::new(2);
        assert_eq!(ledger.increment(Scope::Connection), 1);
        assert_eq!(ledger.increment(Scope::Connection), 2);
        assert!(!ledger.has_remaining(Scope::Connection));
        assert_eq!(ledger.increment(Scope::Connection), 2);
    }

    #[test]
    fn test_scopes_are_independent() {
        let mut ledger = RetryLedger::new(3);
        ledger.increment(Scope::FileOpen);
        assert_eq!(ledger.get(Scope::FileOpen), 1);
        assert_eq!(ledger.get(Scope::Connection), 0);

        ledger.reset(Scope::FileOpen);
        assert_eq!(ledger.get(Scope::FileOpen), 0);
    }

    #[test]
    fn test_scope_messages() {
        assert_eq!(Scope::Connection.message(), "The connection has failed");
        assert_eq!(Scope::FileOpen.message(), "File failed to open");
        assert_eq!(Scope::FileOpen.to_string(), "fileOpen");
    }
}
