//! The transport seam: one logical GET per start, progress ticks, one terminal.

use crate::item::ErrorKind;

use bytes::Bytes;
use reqwest::Url;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Identifies one attempt of one item. At most one transport runs per ticket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticket {
    /// Item id.
    pub id: String,
    /// 1-based attempt number.
    pub attempt: u32,
}

impl Ticket {
    /// Ticket for attempt `attempt` of item `id`.
    pub fn new(id: impl Into<String>, attempt: u32) -> Self {
        Self {
            id: id.into(),
            attempt,
        }
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.attempt)
    }
}

/// How a transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    /// The whole body was received.
    Success(Bytes),
    /// The transfer failed.
    Failed(ErrorKind),
    /// The transfer was cancelled through its handle.
    Cancelled,
}

/// Events emitted by a transport for a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Bytes received so far and the expected total (`0` when unknown).
    Progress { received: u64, total: u64 },
    /// The single terminal event.
    Finished(TransportOutcome),
}

/// A transport event tagged with the attempt it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub ticket: Ticket,
    pub event: TransportEvent,
}

/// Where a transport reports its events.
///
/// Progress may be reported any number of times; [`TransportSink::finish`]
/// consumes the sink, so nothing can follow the terminal event. A sink that
/// is dropped without finishing reports `Failed(Other)`.
pub struct TransportSink {
    ticket: Ticket,
    tx: Option<mpsc::UnboundedSender<TransportMessage>>,
}

impl fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSink")
            .field("ticket", &self.ticket)
            .field("finished", &self.tx.is_none())
            .finish()
    }
}

impl TransportSink {
    /// Sink reporting on `tx` for `ticket`.
    pub fn new(ticket: Ticket, tx: mpsc::UnboundedSender<TransportMessage>) -> Self {
        Self {
            ticket,
            tx: Some(tx),
        }
    }

    /// The attempt this sink reports for.
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    /// Report bytes received so far.
    pub fn progress(&self, received: u64, total: u64) {
        self.send(TransportEvent::Progress { received, total });
    }

    /// Report the terminal outcome.
    pub fn finish(mut self, outcome: TransportOutcome) {
        self.send(TransportEvent::Finished(outcome));
        self.tx = None;
    }

    fn send(&self, event: TransportEvent) {
        if let Some(ref tx) = self.tx {
            // The receiver only goes away when the engine shuts down.
            let _ = tx.send(TransportMessage {
                ticket: self.ticket.clone(),
                event,
            });
        }
    }
}

impl Drop for TransportSink {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!("Transport for {} ended without a terminal event", self.ticket);
            self.send(TransportEvent::Finished(TransportOutcome::Failed(
                ErrorKind::Other,
            )));
        }
    }
}

/// Handle of a started transfer.
#[derive(Debug, Clone, Default)]
pub struct TransportHandle {
    token: CancellationToken,
}

impl TransportHandle {
    /// A fresh handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token the transport watches to stop early.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Best-effort cancellation. The transport still reports a terminal event.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`TransportHandle::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Issues GET requests with progress.
pub trait Transport: Send + Sync {
    /// Start fetching `url`, reporting to `sink`.
    fn start(&self, url: &Url, sink: TransportSink) -> TransportHandle;

    /// Number of resources currently held by running transfers.
    fn live_resources(&self) -> usize {
        0
    }
}

/// Counts resources held by running transfers.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    live: Arc<AtomicUsize>,
}

impl ResourceTracker {
    /// A tracker with nothing held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a lease, released when dropped.
    pub fn acquire(&self) -> ResourceLease {
        self.live.fetch_add(1, Ordering::SeqCst);
        ResourceLease {
            live: self.live.clone(),
        }
    }

    /// Leases currently outstanding.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// A held transport resource.
#[derive(Debug)]
pub struct ResourceLease {
    live: Arc<AtomicUsize>,
}

impl Drop for ResourceLease {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
