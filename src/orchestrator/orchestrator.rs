//! The dispatch core of the engine.
//!
//! [`Orchestrator`] is synchronous: each entry point processes one input to
//! completion, then executes the retry directives it queued along the way.
//! Nothing it calls can call back into it, so one dispatch turn never
//! observes a half-applied update. Long-running work (transports, writes,
//! prompts, deadlines) runs in spawned tasks that report back as
//! [`Input`]s or [`TransportMessage`]s.

use super::config::EngineConfig;
use super::events::{HostEvent, Input};
use crate::connectivity::{BearerProbe, ConnectivityState};
use crate::error::{Error, Result};
use crate::item::{Batch, BatchId, ErrorKind, Item, ItemState, Phase};
use crate::progress::{ProgressModel, ProgressThrottle};
use crate::retry::{Directive, RetryController, RetryEvent, Scope};
use crate::storage::{ArtifactWriter, WriteError};
use crate::toast::ToastBus;
use crate::transport::{
    Ticket, Transport, TransportEvent, TransportHandle, TransportMessage, TransportOutcome,
    TransportSink,
};

use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Collaborators of the orchestrator.
pub(crate) struct Wiring {
    pub transport: Arc<dyn Transport>,
    pub writer: Arc<dyn ArtifactWriter>,
    pub toasts: Arc<dyn ToastBus>,
    pub transport_tx: mpsc::UnboundedSender<TransportMessage>,
    pub input_tx: mpsc::UnboundedSender<Input>,
    /// Re-queried when the user asks to retry the connection.
    pub probe: BearerProbe,
}

/// Bookkeeping for a live item.
struct Entry {
    item: Item,
    batch: BatchId,
    handle: Option<TransportHandle>,
    deadline: Option<JoinHandle<()>>,
    timed_out: bool,
    cancelled: bool,
    throttle: ProgressThrottle,
    /// Received body, kept until it is persisted.
    payload: Option<Bytes>,
    /// Set while the payload waits on a file-open prompt.
    write_error: Option<ErrorKind>,
}

impl Entry {
    fn in_flight(&self) -> bool {
        self.handle.is_some()
    }
}

pub(crate) struct Orchestrator {
    config: EngineConfig,
    wiring: Wiring,
    model: ProgressModel,
    retry: RetryController,
    connectivity: ConnectivityState,
    entries: IndexMap<String, Entry>,
    pending: VecDeque<String>,
    /// Remaining non-terminal items per batch.
    batches: HashMap<BatchId, usize>,
    next_batch: u64,
    /// Paths with a write in progress.
    writing: HashSet<PathBuf>,
    /// Writes waiting for their path to become free.
    write_queue: HashMap<PathBuf, VecDeque<String>>,
    /// Writes waiting on the file-open prompt.
    parked: Vec<String>,
    directives: VecDeque<Directive>,
    outbox: Vec<HostEvent>,
}

impl Orchestrator {
    pub fn new(config: EngineConfig, wiring: Wiring, connectivity: ConnectivityState) -> Self {
        Self {
            retry: RetryController::new(config.max_retries),
            config,
            wiring,
            model: ProgressModel::new(),
            connectivity,
            entries: IndexMap::new(),
            pending: VecDeque::new(),
            batches: HashMap::new(),
            next_batch: 1,
            writing: HashSet::new(),
            write_queue: HashMap::new(),
            parked: Vec::new(),
            directives: VecDeque::new(),
            outbox: Vec::new(),
        }
    }

    /// Events produced since the last call, in emission order.
    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn snapshot(&self) -> Vec<ItemState> {
        self.model.snapshot()
    }

    /// Whether no item is live.
    pub fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of items holding a concurrency slot.
    pub fn active(&self) -> usize {
        self.model.active()
    }

    /// Queue every item of `batch`.
    ///
    /// The batch is rejected as a whole if one of its ids is already live
    /// or appears twice.
    pub fn submit(&mut self, batch: Batch) -> Result<BatchId> {
        let mut seen = HashSet::new();
        for item in batch.items() {
            if self.model.is_live(&item.id) || !seen.insert(item.id.as_str()) {
                return Err(Error::DuplicateItem(item.id.clone()));
            }
        }

        let id = BatchId(self.next_batch);
        self.next_batch += 1;

        let items = batch.into_items();
        info!("Submitting {} with {} item(s)", id, items.len());
        if items.is_empty() {
            self.outbox.push(HostEvent::BatchDone(id));
            return Ok(id);
        }

        self.batches.insert(id, items.len());
        for item in items {
            let state = ItemState::queued(item.id.clone());
            self.model.insert(state.clone())?;
            self.outbox.push(HostEvent::ItemChanged(state));
            self.pending.push_back(item.id.clone());
            self.entries.insert(
                item.id.clone(),
                Entry {
                    item,
                    batch: id,
                    handle: None,
                    deadline: None,
                    timed_out: false,
                    cancelled: false,
                    throttle: ProgressThrottle::new(
                        self.config.progress_min_interval(),
                        self.config.progress_min_bytes,
                    ),
                    payload: None,
                    write_error: None,
                },
            );
        }

        self.pump();
        self.settle();
        Ok(id)
    }

    /// Cancel every non-terminal item of `batch`.
    ///
    /// Queued items and items waiting on a prompt end immediately. Running
    /// transfers are cancelled and end when their transport reports back.
    /// A write in progress is left to finish.
    pub fn cancel(&mut self, batch: BatchId) -> Result<()> {
        if !self.batches.contains_key(&batch) {
            // Finished batches do not need cancelling.
            return match batch.0 < self.next_batch {
                true => Ok(()),
                false => Err(Error::UnknownBatch(batch.0)),
            };
        }
        debug!("Cancelling {}", batch);

        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.batch == batch)
            .map(|(id, _)| id.clone())
            .collect();

        for id in ids {
            self.cancel_item(&id);
        }

        self.tidy_prompts();
        self.pump();
        self.settle();
        Ok(())
    }

    /// Cancel everything, used when the engine shuts down.
    pub fn cancel_all(&mut self) {
        let batches: Vec<BatchId> = self.batches.keys().copied().collect();
        for batch in batches {
            let _ = self.cancel(batch);
        }
        for scope in Scope::ALL {
            let withdrawn = self.retry.withdraw(scope);
            self.directives.extend(withdrawn);
        }
        self.settle();
    }

    /// Apply a connectivity transition.
    pub fn on_connectivity(&mut self, state: ConnectivityState) {
        self.apply_connectivity(state);
        self.pump();
        self.settle();
    }

    /// Record `state` unless it is already the current one. A transition
    /// the orchestrator applied itself also arrives through the probe's
    /// observer afterwards.
    fn apply_connectivity(&mut self, state: ConnectivityState) {
        if state == self.connectivity {
            return;
        }
        let was_online = self.connectivity.online;
        self.connectivity = state;
        debug!("Connectivity: online={} bearer={}", state.online, state.bearer);
        self.outbox.push(HostEvent::Connectivity(state));

        if state.online && !was_online {
            let recovered = self.retry.on_online();
            self.directives.extend(recovered);
        }
    }

    pub fn on_input(&mut self, input: Input) {
        match input {
            Input::Deadline(ticket) => self.on_deadline(ticket),
            Input::WriteFinished { id, result } => self.on_write_finished(id, result),
            Input::ToastFinished { id, result } => {
                let next = self.retry.on_toast_result(id, result);
                self.directives.extend(next);
            }
        }
        self.pump();
        self.settle();
    }

    pub fn on_transport(&mut self, msg: TransportMessage, now: Instant) {
        let TransportMessage { ticket, event } = msg;
        let current = self
            .entries
            .get(&ticket.id)
            .is_some_and(|e| e.in_flight())
            && self
                .model
                .get(&ticket.id)
                .is_some_and(|s| s.attempt == ticket.attempt);
        if !current {
            debug!("Dropping stale event for {}", ticket);
            return;
        }

        match event {
            TransportEvent::Progress { received, total } => {
                self.on_progress(&ticket.id, received, total, now)
            }
            TransportEvent::Finished(outcome) => {
                self.on_finished(&ticket.id, outcome);
                self.pump();
            }
        }
        self.settle();
    }

    fn on_progress(&mut self, id: &str, received: u64, total: u64, now: Instant) {
        let Some(state) = self.model.get(id) else {
            return;
        };
        if state.phase == Phase::Downloading && received < state.bytes_received {
            return;
        }

        let next = ItemState {
            phase: Phase::Downloading,
            bytes_received: received,
            bytes_total: if total > 0 { total.max(received) } else { 0 },
            ..state.clone()
        };
        let phase_changed = state.phase != Phase::Downloading;

        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        if phase_changed {
            entry.throttle.mark(now, received);
        } else if !entry.throttle.should_emit(now, received) {
            return;
        }
        self.publish(next);
    }

    fn on_finished(&mut self, id: &str, outcome: TransportOutcome) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        entry.handle = None;
        if let Some(deadline) = entry.deadline.take() {
            deadline.abort();
        }
        let cancelled = entry.cancelled;
        let has_destination = entry.item.destination.is_some();

        let outcome = match outcome {
            TransportOutcome::Cancelled if entry.timed_out => {
                TransportOutcome::Failed(ErrorKind::Timeout)
            }
            other => other,
        };

        match outcome {
            TransportOutcome::Success(payload) if !(cancelled && has_destination) => {
                self.scope_succeeded(Scope::Connection);
                self.on_payload(id, payload);
            }
            _ if cancelled => self.finish(id, Phase::Cancelled, None),
            TransportOutcome::Success(_) | TransportOutcome::Cancelled => {
                self.finish(id, Phase::Cancelled, None)
            }
            TransportOutcome::Failed(kind) => self.on_transfer_failed(id, kind),
        }
    }

    fn on_payload(&mut self, id: &str, payload: Bytes) {
        let Some(state) = self.model.get(id).cloned() else {
            return;
        };
        let len = payload.len() as u64;
        let bytes_total = match state.bytes_total {
            0 => len,
            total => total.max(len),
        };

        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        match entry.item.destination.clone() {
            Some(path) => {
                entry.payload = Some(payload);
                self.publish(ItemState {
                    phase: Phase::Writing,
                    bytes_received: len,
                    bytes_total,
                    ..state
                });
                self.schedule_write(id, path);
            }
            None => {
                self.outbox.push(HostEvent::PayloadReady {
                    id: id.to_string(),
                    payload,
                });
                self.publish(ItemState {
                    phase: Phase::Done,
                    bytes_received: len,
                    bytes_total,
                    ..state
                });
                self.release(id);
            }
        }
    }

    fn on_transfer_failed(&mut self, id: &str, kind: ErrorKind) {
        let Some(state) = self.model.get(id).cloned() else {
            return;
        };
        if !kind.is_retry_eligible() || state.attempt >= self.config.max_retries {
            debug!("{} failed with {} after {} attempt(s)", id, kind, state.attempt);
            self.finish(id, Phase::Failed, Some(kind));
            return;
        }

        debug!("{} failed with {}, requeueing", id, kind);
        let failed = ItemState {
            phase: Phase::Failed,
            last_error_kind: Some(kind),
            ..state
        };
        self.publish(failed.clone());
        self.publish(failed.retried());
        if let Some(entry) = self.entries.get_mut(id) {
            entry.timed_out = false;
            entry.throttle.reset();
        }
        self.pending.push_back(id.to_string());
    }

    fn on_deadline(&mut self, ticket: Ticket) {
        let current = self
            .model
            .get(&ticket.id)
            .is_some_and(|s| s.attempt == ticket.attempt);
        let Some(entry) = self.entries.get_mut(&ticket.id) else {
            return;
        };
        if !current {
            return;
        }
        if let Some(ref handle) = entry.handle {
            debug!("{} exceeded its deadline", ticket);
            entry.timed_out = true;
            entry.deadline = None;
            handle.cancel();
        }
    }

    fn on_write_finished(&mut self, id: String, result: std::result::Result<(), WriteError>) {
        let Some(path) = self
            .entries
            .get(&id)
            .and_then(|e| e.item.destination.clone())
        else {
            return;
        };
        self.writing.remove(&path);
        self.advance_write_queue(&path);

        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        match result {
            Ok(()) => {
                debug!("{} persisted to {:?}", id, path);
                entry.payload = None;
                self.finish(&id, Phase::Done, None);
                self.scope_succeeded(Scope::FileOpen);
            }
            Err(_) if entry.cancelled => self.finish(&id, Phase::Cancelled, None),
            Err(e) => {
                warn!("Writing {} failed: {}", id, e);
                if self.retry.is_terminal(Scope::FileOpen) {
                    self.finish(&id, Phase::Failed, Some(e.kind));
                    return;
                }
                entry.write_error = Some(e.kind);
                self.parked.push(id);
                let directives = self.retry.on_failure(Scope::FileOpen);
                self.directives.extend(directives);
            }
        }
    }

    fn on_retry_event(&mut self, event: RetryEvent) {
        info!("Retry decision: {:?}", event);
        match event {
            RetryEvent::Retry {
                scope: Scope::Connection,
                ..
            } => {
                let state = self.wiring.probe.refresh();
                self.apply_connectivity(state);
                self.pump();
            }
            RetryEvent::Recovered { .. } => self.pump(),
            RetryEvent::Retry {
                scope: Scope::FileOpen,
                ..
            } => {
                for id in std::mem::take(&mut self.parked) {
                    let Some(entry) = self.entries.get_mut(&id) else {
                        continue;
                    };
                    entry.write_error = None;
                    if let Some(path) = entry.item.destination.clone() {
                        self.schedule_write(&id, path);
                    }
                }
            }
            RetryEvent::GiveUp { .. } => {}
            RetryEvent::TerminalFailure {
                scope: Scope::Connection,
            } => {
                for id in std::mem::take(&mut self.pending) {
                    self.finish(&id, Phase::Failed, Some(ErrorKind::ConnectionLost));
                }
            }
            RetryEvent::TerminalFailure {
                scope: Scope::FileOpen,
            } => {
                for id in std::mem::take(&mut self.parked) {
                    let kind = self
                        .entries
                        .get(&id)
                        .and_then(|e| e.write_error)
                        .unwrap_or(ErrorKind::OpenFailed);
                    self.finish(&id, Phase::Failed, Some(kind));
                }
            }
            RetryEvent::ExitRequested { .. } => self.outbox.push(HostEvent::ExitRequested),
        }
    }

    /// Admit pending items while slots are free.
    fn pump(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        if self.retry.is_terminal(Scope::Connection) {
            for id in std::mem::take(&mut self.pending) {
                self.finish(&id, Phase::Failed, Some(ErrorKind::ConnectionLost));
            }
            return;
        }
        if !self.connectivity.online {
            let directives = self.retry.on_failure(Scope::Connection);
            self.directives.extend(directives);
            return;
        }

        let mut active = self.active();
        while active < self.config.max_concurrent {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            self.start(&id);
            active += 1;
        }
    }

    fn start(&mut self, id: &str) {
        let Some(state) = self.model.get(id).cloned() else {
            return;
        };
        let ticket = Ticket::new(id, state.attempt);
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        debug!("Starting {}", ticket);

        let sink = TransportSink::new(ticket.clone(), self.wiring.transport_tx.clone());
        entry.handle = Some(self.wiring.transport.start(&entry.item.url, sink));
        entry.timed_out = false;

        let input_tx = self.wiring.input_tx.clone();
        let timeout = self.config.attempt_timeout();
        entry.deadline = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = input_tx.send(Input::Deadline(ticket));
        }));

        self.publish(ItemState {
            phase: Phase::Connecting,
            bytes_received: 0,
            bytes_total: 0,
            ..state
        });
    }

    /// Write the payload of `id`, or queue it behind the write in progress
    /// for the same path.
    fn schedule_write(&mut self, id: &str, path: PathBuf) {
        if self.writing.contains(&path) {
            self.write_queue
                .entry(path)
                .or_default()
                .push_back(id.to_string());
            return;
        }
        self.launch_write(id, path);
    }

    fn launch_write(&mut self, id: &str, path: PathBuf) {
        let Some(payload) = self.entries.get(id).and_then(|e| e.payload.clone()) else {
            return;
        };
        self.writing.insert(path.clone());

        let writer = self.wiring.writer.clone();
        let input_tx = self.wiring.input_tx.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            let result = writer.write(&path, payload).await;
            let _ = input_tx.send(Input::WriteFinished { id, result });
        });
    }

    fn advance_write_queue(&mut self, path: &Path) {
        let Some(queue) = self.write_queue.get_mut(path) else {
            return;
        };
        let next = queue.pop_front();
        if queue.is_empty() {
            self.write_queue.remove(path);
        }
        if let Some(id) = next {
            self.launch_write(&id, path.to_path_buf());
        }
    }

    fn cancel_item(&mut self, id: &str) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        entry.cancelled = true;

        if let Some(ref handle) = entry.handle {
            handle.cancel();
            return;
        }

        if let Some(pos) = self.pending.iter().position(|p| p == id) {
            self.pending.remove(pos);
            self.finish(id, Phase::Cancelled, None);
            return;
        }

        if let Some(pos) = self.parked.iter().position(|p| p == id) {
            self.parked.remove(pos);
            self.finish(id, Phase::Cancelled, None);
            return;
        }

        let queued_write = self.write_queue.values_mut().find_map(|queue| {
            let pos = queue.iter().position(|q| q == id)?;
            queue.remove(pos)
        });
        if queued_write.is_some() {
            self.write_queue.retain(|_, queue| !queue.is_empty());
            self.finish(id, Phase::Cancelled, None);
        }
        // Otherwise a write is in progress and decides the outcome.
    }

    /// Reset `scope` unless other work still waits on its prompt.
    fn scope_succeeded(&mut self, scope: Scope) {
        let waiting = match scope {
            Scope::Connection => !self.connectivity.online && !self.pending.is_empty(),
            Scope::FileOpen => !self.parked.is_empty(),
        };
        if !waiting {
            let directives = self.retry.on_success(scope);
            self.directives.extend(directives);
        }
    }

    /// Withdraw prompts with nothing left to retry.
    fn tidy_prompts(&mut self) {
        let waiting_on_connection = !self.pending.is_empty();
        if !waiting_on_connection && self.retry.is_prompting(Scope::Connection) {
            let withdrawn = self.retry.withdraw(Scope::Connection);
            self.directives.extend(withdrawn);
        }
        if self.parked.is_empty() && self.retry.is_prompting(Scope::FileOpen) {
            let withdrawn = self.retry.withdraw(Scope::FileOpen);
            self.directives.extend(withdrawn);
        }
    }

    /// Move `id` to a terminal phase and release it.
    fn finish(&mut self, id: &str, phase: Phase, kind: Option<ErrorKind>) {
        let Some(state) = self.model.get(id).cloned() else {
            return;
        };
        self.publish(ItemState {
            phase,
            last_error_kind: kind.or(state.last_error_kind),
            ..state
        });
        self.release(id);
    }

    /// Forget a terminal item and close its batch when it was the last one.
    fn release(&mut self, id: &str) {
        let Some(entry) = self.entries.shift_remove(id) else {
            return;
        };
        if let Some(handle) = entry.handle {
            handle.cancel();
        }
        if let Some(deadline) = entry.deadline {
            deadline.abort();
        }

        let Some(remaining) = self.batches.get_mut(&entry.batch) else {
            return;
        };
        *remaining -= 1;
        if *remaining == 0 {
            self.batches.remove(&entry.batch);
            info!("{} done", entry.batch);
            self.outbox.push(HostEvent::BatchDone(entry.batch));
        }
    }

    fn publish(&mut self, next: ItemState) {
        match self.model.update(next.clone()) {
            Ok(()) => self.outbox.push(HostEvent::ItemChanged(next)),
            Err(e) => warn!("Discarding update: {}", e),
        }
    }

    /// Execute queued directives until none are left.
    fn settle(&mut self) {
        while let Some(directive) = self.directives.pop_front() {
            match directive {
                Directive::Show(toast) => {
                    let id = toast.id;
                    let answer = self.wiring.toasts.show(toast);
                    let input_tx = self.wiring.input_tx.clone();
                    tokio::spawn(async move {
                        let result = answer.await;
                        let _ = input_tx.send(Input::ToastFinished { id, result });
                    });
                }
                Directive::Cancel(id) => self.wiring.toasts.cancel(id),
                Directive::Notify(event) => self.on_retry_event(event),
            }
        }
    }
}
