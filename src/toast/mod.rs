//! Toast bus: short user-facing prompts with at most one button.
//!
//! The engine only talks to prompts through [`ToastBus`]. Hosts that render
//! prompts themselves use [`ChannelToastBus`]: prompts arrive as
//! [`ToastNotice`]s and answers go back through [`ChannelToastBus::respond`].
//!
//! # Examples
//!
//! ```rust
//! use ferry::toast::{ChannelToastBus, Toast, ToastBus, ToastId, ToastNotice, ToastResult};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (bus, mut notices) = ChannelToastBus::new();
//! let answer = bus.show(Toast::with_button(ToastId(1), "The connection has failed", "Retry 1 of 3"));
//!
//! if let Some(ToastNotice::Show(toast)) = notices.recv().await {
//!     bus.respond(toast.id, ToastResult::ButtonSelected);
//! }
//! assert_eq!(answer.await, ToastResult::ButtonSelected);
//! # }
//! ```

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Identifies a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ToastId(pub u64);

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "toast-{}", self.0)
    }
}

/// A prompt to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: ToastId,
    pub body: String,
    /// Label of the single button; informational toasts have none.
    pub button: Option<String>,
}

impl Toast {
    /// A prompt offering one action.
    pub fn with_button(id: ToastId, body: impl Into<String>, button: impl Into<String>) -> Self {
        Self {
            id,
            body: body.into(),
            button: Some(button.into()),
        }
    }

    /// A message without an action.
    pub fn informational(id: ToastId, body: impl Into<String>) -> Self {
        Self {
            id,
            body: body.into(),
            button: None,
        }
    }
}

/// How a prompt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastResult {
    /// The user pressed the button.
    ButtonSelected,
    /// The user closed the prompt without pressing the button.
    Dismissed,
    /// The prompt was withdrawn through [`ToastBus::cancel`].
    Cancelled,
}

/// Request/response surface for prompts.
pub trait ToastBus: Send + Sync {
    /// Display `toast`, resolving once it ends.
    fn show(&self, toast: Toast) -> BoxFuture<'static, ToastResult>;

    /// Withdraw a displayed prompt. Its future resolves to
    /// [`ToastResult::Cancelled`].
    fn cancel(&self, id: ToastId);
}

/// What [`ChannelToastBus`] asks the host to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ToastNotice {
    /// Display a prompt.
    Show(Toast),
    /// Remove a prompt that was withdrawn.
    Dismiss(ToastId),
}

struct BusInner {
    notices: mpsc::UnboundedSender<ToastNotice>,
    pending: Mutex<HashMap<ToastId, oneshot::Sender<ToastResult>>>,
}

/// [`ToastBus`] forwarding prompts to the host over a channel.
#[derive(Clone)]
pub struct ChannelToastBus {
    inner: Arc<BusInner>,
}

impl fmt::Debug for ChannelToastBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelToastBus")
            .field("pending", &self.pending())
            .finish()
    }
}

impl ChannelToastBus {
    /// A bus plus the receiver the host reads prompts from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ToastNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = Self {
            inner: Arc::new(BusInner {
                notices: tx,
                pending: Mutex::new(HashMap::new()),
            }),
        };
        (bus, rx)
    }

    /// Deliver the host's answer for a displayed prompt.
    ///
    /// Returns `false` when the prompt is unknown or already resolved.
    pub fn respond(&self, id: ToastId, result: ToastResult) -> bool {
        match self.take(id) {
            Some(sender) => sender.send(result).is_ok(),
            None => false,
        }
    }

    /// Number of prompts awaiting an answer.
    pub fn pending(&self) -> usize {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn take(&self, id: ToastId) -> Option<oneshot::Sender<ToastResult>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }
}

impl ToastBus for ChannelToastBus {
    fn show(&self, toast: Toast) -> BoxFuture<'static, ToastResult> {
        let id = toast.id;
        let (tx, rx) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);

        debug!("Showing {}: {:?}", id, toast.body);
        if self.inner.notices.send(ToastNotice::Show(toast)).is_err() {
            // Nobody renders prompts, so nobody can ever answer this one.
            self.take(id);
            return futures::future::ready(ToastResult::Dismissed).boxed();
        }

        async move { rx.await.unwrap_or(ToastResult::Cancelled) }.boxed()
    }

    fn cancel(&self, id: ToastId) {
        if let Some(sender) = self.take(id) {
            debug!("Withdrawing {}", id);
            let _ = sender.send(ToastResult::Cancelled);
            let _ = self.inner.notices.send(ToastNotice::Dismiss(id));
        }
    }
}
