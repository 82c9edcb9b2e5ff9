//! Observable per-item state.
//!
//! An [`ItemState`] is what hosts see for each submitted item. Its [`Phase`]
//! only moves forward, with one exception: an automatic retry takes a
//! `failed` item back to `queued` with the attempt counter incremented.
//!
//! ```rust
//! use ferry::item::{ErrorKind, ItemState, Phase};
//!
//! let queued = ItemState::queued("a.png");
//! let failed = ItemState { phase: Phase::Failed, last_error_kind: Some(ErrorKind::Timeout), ..queued.clone() };
//! let retry = failed.retried();
//!
//! assert!(queued.can_become(&failed));
//! assert!(failed.can_become(&retry));
//! assert_eq!(retry.attempt, 2);
//! assert_eq!(retry.percent(), None);
//! ```

use serde::Serialize;
use std::fmt;

/// Where an item is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for a transport slot.
    Queued,
    /// Transport started, no bytes received yet.
    Connecting,
    /// Bytes are arriving.
    Downloading,
    /// Payload received, being persisted.
    Writing,
    /// Completed successfully.
    Done,
    /// Gave up, see `last_error_kind`.
    Failed,
    /// Cancelled by the host.
    Cancelled,
}

impl Phase {
    /// Position in the forward order. All terminal phases share the last rank.
    pub fn rank(self) -> u8 {
        match self {
            Phase::Queued => 0,
            Phase::Connecting => 1,
            Phase::Downloading => 2,
            Phase::Writing => 3,
            Phase::Done | Phase::Failed | Phase::Cancelled => 4,
        }
    }

    /// Whether the phase ends an attempt.
    pub fn is_terminal(self) -> bool {
        self.rank() == 4
    }

    /// Whether the item holds a concurrency slot in this phase.
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Connecting | Phase::Downloading | Phase::Writing)
    }

    /// Snake-case tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Queued => "queued",
            Phase::Connecting => "connecting",
            Phase::Downloading => "downloading",
            Phase::Writing => "writing",
            Phase::Done => "done",
            Phase::Failed => "failed",
            Phase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure tags reported on the progress model.
///
/// The mapping from library errors happens at the transport and storage
/// boundaries; the orchestrator only reasons about these tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The server answered 404/410.
    ContentNotFound,
    /// The host name could not be resolved.
    HostNotFound,
    /// The server asked for credentials.
    AuthRequired,
    /// The connection dropped or could not be established.
    ConnectionLost,
    /// The attempt exceeded its deadline.
    Timeout,
    /// Anything else the transport reported.
    Other,
    /// The destination could not be opened or created.
    OpenFailed,
    /// The destination was opened but the payload could not be written.
    WriteFailed,
}

impl ErrorKind {
    /// Transient transport errors are retried automatically, up to the
    /// configured number of attempts.
    pub fn is_retry_eligible(self) -> bool {
        matches!(
            self,
            ErrorKind::ConnectionLost | ErrorKind::Timeout | ErrorKind::Other
        )
    }

    /// Snake-case tag.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ContentNotFound => "content_not_found",
            ErrorKind::HostNotFound => "host_not_found",
            ErrorKind::AuthRequired => "auth_required",
            ErrorKind::ConnectionLost => "connection_lost",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Other => "other",
            ErrorKind::OpenFailed => "open_failed",
            ErrorKind::WriteFailed => "write_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable record for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemState {
    /// Item id.
    pub id: String,
    /// Current phase.
    pub phase: Phase,
    /// Bytes received in the current attempt.
    pub bytes_received: u64,
    /// Expected size, `0` when unknown.
    pub bytes_total: u64,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Last failure seen for this item.
    pub last_error_kind: Option<ErrorKind>,
}

impl ItemState {
    /// Initial state of a freshly submitted item.
    pub fn queued(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            phase: Phase::Queued,
            bytes_received: 0,
            bytes_total: 0,
            attempt: 1,
            last_error_kind: None,
        }
    }

    /// Progress in percent, `None` while the total is unknown.
    pub fn percent(&self) -> Option<u8> {
        if self.bytes_total == 0 {
            return None;
        }
        let received = self.bytes_received.min(self.bytes_total);
        Some((received.saturating_mul(100) / self.bytes_total) as u8)
    }

    /// The next attempt of a failed item: back to `queued` with counters reset.
    pub fn retried(&self) -> Self {
        Self {
            phase: Phase::Queued,
            bytes_received: 0,
            bytes_total: 0,
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// Phases never go backwards, terminal phases are final, and within a
    /// phase the byte count does not decrease. The only way out of a
    /// terminal phase is `failed@k -> queued@k+1`.
    pub fn can_become(&self, next: &ItemState) -> bool {
        if self.id != next.id {
            return false;
        }
        if self.phase == Phase::Failed
            && next.phase == Phase::Queued
            && next.attempt == self.attempt + 1
        {
            return true;
        }
        if next.attempt != self.attempt {
            return false;
        }
        if self.phase.is_terminal() {
            return false;
        }
        if next.phase.rank() < self.phase.rank() {
            return false;
        }
        if next.phase == self.phase && next.bytes_received < self.bytes_received {
            return false;
        }
        if next.bytes_total > 0 && next.bytes_received > next.bytes_total {
            return false;
        }
        true
    }
}
