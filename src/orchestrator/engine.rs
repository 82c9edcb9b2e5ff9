//! The engine task and the handle hosts drive it with.
//!
//! All state lives in one tokio task. Its loop polls, in priority order:
//! connectivity transitions, host commands, completions of spawned work and
//! transport events. An `online` transition is therefore always applied
//! before anything that was waiting on it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferry::item::{Batch, Phase};
//! use ferry::orchestrator::EngineBuilder;
//!
//! # async fn example() -> Result<(), ferry::Error> {
//! let engine = EngineBuilder::new().max_concurrent(2).spawn()?;
//!
//! let batch = Batch::from_urls([
//!     "https://example.com/images/a.png",
//!     "https://example.com/images/b.png",
//! ])?;
//! for state in engine.download(batch).await? {
//!     println!("{}: {}", state.id, state.phase);
//! }
//!
//! engine.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use super::config::EventCallback;
use super::events::{HostEvent, Input};
use super::orchestrator::Orchestrator;
use crate::connectivity::{BearerProbe, ConnectivityState};
use crate::error::{Error, Result};
use crate::item::{Batch, BatchId, ItemState};
use crate::transport::TransportMessage;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

/// Capacity of the host event channel. Slow subscribers lag past it.
pub(crate) const EVENT_BUFFER: usize = 1024;

pub(crate) enum Command {
    Submit {
        batch: Batch,
        reply: oneshot::Sender<Result<BatchId>>,
        /// Resolved when the batch's `BatchDone` is published.
        done: Option<oneshot::Sender<()>>,
    },
    Cancel {
        batch: BatchId,
        reply: oneshot::Sender<Result<()>>,
    },
    Subscribe {
        reply: oneshot::Sender<(Vec<ItemState>, broadcast::Receiver<HostEvent>)>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<ItemState>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

pub(crate) struct Engine {
    pub orchestrator: Orchestrator,
    pub commands: mpsc::UnboundedReceiver<Command>,
    pub inputs: mpsc::UnboundedReceiver<Input>,
    pub transport: mpsc::UnboundedReceiver<TransportMessage>,
    pub connectivity: mpsc::UnboundedReceiver<ConnectivityState>,
    pub events: broadcast::Sender<HostEvent>,
    pub on_event: Option<Arc<EventCallback>>,
    /// Keeps the probe and its observer alive for the engine's lifetime.
    pub _probe: BearerProbe,
    pub waiters: HashMap<BatchId, oneshot::Sender<()>>,
}

impl Engine {
    pub async fn run(mut self) {
        debug!("Engine started");
        let mut closing: Option<Vec<oneshot::Sender<()>>> = None;
        let mut accepting = true;

        loop {
            tokio::select! {
                biased;

                Some(state) = self.connectivity.recv() => self.orchestrator.on_connectivity(state),
                command = self.commands.recv(), if accepting => match command {
                    Some(command) => self.handle(command, &mut closing),
                    None => {
                        // Every handle is gone.
                        accepting = false;
                        self.orchestrator.cancel_all();
                        closing.get_or_insert_with(Vec::new);
                    }
                },
                Some(input) = self.inputs.recv() => self.orchestrator.on_input(input),
                Some(message) = self.transport.recv() => {
                    self.orchestrator.on_transport(message, Instant::now())
                }
            }
            self.publish();

            if closing.is_some() && self.orchestrator.is_idle() {
                break;
            }
        }

        for reply in closing.into_iter().flatten() {
            let _ = reply.send(());
        }
        debug!("Engine stopped");
    }

    fn handle(&mut self, command: Command, closing: &mut Option<Vec<oneshot::Sender<()>>>) {
        match command {
            Command::Submit { batch, reply, done } => {
                let result = match closing {
                    Some(_) => Err(Error::EngineClosed),
                    None => self.orchestrator.submit(batch),
                };
                if let (Ok(id), Some(done)) = (&result, done) {
                    self.waiters.insert(*id, done);
                }
                let _ = reply.send(result);
            }
            Command::Cancel { batch, reply } => {
                let _ = reply.send(self.orchestrator.cancel(batch));
            }
            Command::Subscribe { reply } => {
                let receiver = self.events.subscribe();
                let _ = reply.send((self.orchestrator.snapshot(), receiver));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.orchestrator.snapshot());
            }
            Command::Shutdown { reply } => {
                if closing.is_none() {
                    debug!("Shutting down");
                    self.orchestrator.cancel_all();
                }
                closing.get_or_insert_with(Vec::new).push(reply);
            }
        }
    }

    fn publish(&mut self) {
        for event in self.orchestrator.drain_events() {
            if let Some(ref callback) = self.on_event {
                callback(&event);
            }
            if let HostEvent::BatchDone(id) = &event {
                if let Some(done) = self.waiters.remove(id) {
                    let _ = done.send(());
                }
            }
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }
}

/// Cloneable handle to a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    probe: BearerProbe,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Submit { .. } => "Submit",
            Command::Cancel { .. } => "Cancel",
            Command::Subscribe { .. } => "Subscribe",
            Command::Snapshot { .. } => "Snapshot",
            Command::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}

impl EngineHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>, probe: BearerProbe) -> Self {
        Self { commands, probe }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| Error::EngineClosed)?;
        rx.await.map_err(|_| Error::EngineClosed)
    }

    /// Queue a batch. The returned handle identifies its
    /// [`HostEvent::BatchDone`].
    pub async fn submit(&self, batch: Batch) -> Result<BatchId> {
        self.request(|reply| Command::Submit {
            batch,
            reply,
            done: None,
        })
        .await?
    }

    /// Cancel every non-terminal item of `batch`.
    pub async fn cancel(&self, batch: BatchId) -> Result<()> {
        self.request(|reply| Command::Cancel { batch, reply }).await?
    }

    /// Current records plus a receiver for every event after them.
    pub async fn subscribe(&self) -> Result<(Vec<ItemState>, broadcast::Receiver<HostEvent>)> {
        self.request(|reply| Command::Subscribe { reply }).await
    }

    pub async fn snapshot(&self) -> Result<Vec<ItemState>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Feed a raw bearer name from the platform.
    ///
    /// Returns `true` when this changed the connectivity state.
    pub fn os_bearer_changed(&self, raw: &str) -> bool {
        self.probe.os_bearer_changed(raw)
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.probe.current()
    }

    pub fn probe(&self) -> &BearerProbe {
        &self.probe
    }

    /// Submit `batch` and wait for it to complete, returning the final
    /// record of each of its items in submission order.
    pub async fn download(&self, batch: Batch) -> Result<Vec<ItemState>> {
        let ids: Vec<String> = batch.items().iter().map(|i| i.id.clone()).collect();
        let (done_tx, done_rx) = oneshot::channel();
        self.request(|reply| Command::Submit {
            batch,
            reply,
            done: Some(done_tx),
        })
        .await??;
        // Resolved by the engine when it publishes this batch's BatchDone.
        done_rx.await.map_err(|_| Error::EngineClosed)?;

        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .snapshot()
            .await?
            .into_iter()
            .filter(|s| wanted.contains(s.id.as_str()))
            .collect())
    }

    /// Cancel all work and stop the engine once every item is terminal.
    pub async fn shutdown(&self) -> Result<()> {
        match self.request(|reply| Command::Shutdown { reply }).await {
            Ok(()) | Err(Error::EngineClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
