#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use ferry::connectivity::{BearerProbe, ConnectivityState, PlatformProbe};
use ferry::item::{ErrorKind, ItemState, Phase};
use ferry::orchestrator::{EngineBuilder, HostEvent};
use ferry::storage::{ArtifactWriter, WriteError};
use ferry::toast::{ChannelToastBus, ToastNotice, ToastResult};
use ferry::transport::{HttpTransport, Ticket, Transport, TransportHandle, TransportOutcome, TransportSink};
use ferry::Url;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Upper bound for waiting on engine events. Virtual under a paused clock.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(120);

// === Scripted Transport ===

/// One step of a scripted attempt.
#[derive(Debug, Clone)]
pub enum Step {
    Progress(u64, u64),
    Delay(Duration),
    Succeed(Bytes),
    Fail(ErrorKind),
    /// Wait until cancelled.
    Hang,
}

impl Step {
    pub fn succeed(body: &'static [u8]) -> Self {
        Step::Succeed(Bytes::from_static(body))
    }
}

#[derive(Default)]
struct ScriptState {
    scripts: Mutex<HashMap<String, VecDeque<Vec<Step>>>>,
    started: Mutex<Vec<Ticket>>,
    live: AtomicUsize,
    max_live: AtomicUsize,
}

/// Plays back scripted attempts per item id. Unscripted attempts succeed
/// with an empty body.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<ScriptState>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the steps of successive attempts of `id`.
    pub fn script(self, id: &str, attempts: Vec<Vec<Step>>) -> Self {
        self.inner
            .scripts
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .extend(attempts);
        self
    }

    pub fn started(&self) -> Vec<Ticket> {
        self.inner.started.lock().unwrap().clone()
    }

    pub fn started_ids(&self) -> Vec<String> {
        self.started().into_iter().map(|t| t.id).collect()
    }

    pub fn max_live(&self) -> usize {
        self.inner.max_live.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn start(&self, _url: &Url, sink: TransportSink) -> TransportHandle {
        let steps = self
            .inner
            .scripts
            .lock()
            .unwrap()
            .get_mut(&sink.ticket().id)
            .and_then(|attempts| attempts.pop_front())
            .unwrap_or_else(|| vec![Step::Succeed(Bytes::new())]);

        self.inner.started.lock().unwrap().push(sink.ticket().clone());
        let live = self.inner.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_live.fetch_max(live, Ordering::SeqCst);

        let handle = TransportHandle::new();
        let token = handle.token();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let outcome = play(steps, &sink, &token).await;
            inner.live.fetch_sub(1, Ordering::SeqCst);
            sink.finish(outcome);
        });
        handle
    }

    fn live_resources(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }
}

async fn play(steps: Vec<Step>, sink: &TransportSink, token: &CancellationToken) -> TransportOutcome {
    for step in steps {
        if token.is_cancelled() {
            return TransportOutcome::Cancelled;
        }
        match step {
            Step::Progress(received, total) => sink.progress(received, total),
            Step::Delay(duration) => {
                tokio::select! {
                    _ = token.cancelled() => return TransportOutcome::Cancelled,
                    _ = tokio::time::sleep(duration) => {}
                }
            }
            Step::Succeed(body) => return TransportOutcome::Success(body),
            Step::Fail(kind) => return TransportOutcome::Failed(kind),
            Step::Hang => {
                token.cancelled().await;
                return TransportOutcome::Cancelled;
            }
        }
    }
    TransportOutcome::Success(Bytes::new())
}

// === Scripted Writer ===

#[derive(Default)]
struct WriterState {
    failures_left: Mutex<usize>,
    attempts: AtomicUsize,
    files: Mutex<HashMap<PathBuf, Bytes>>,
}

/// In-memory writer failing the first writes with `open_failed`.
#[derive(Clone, Default)]
pub struct ScriptedWriter {
    inner: Arc<WriterState>,
}

impl ScriptedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: usize) -> Self {
        let writer = Self::default();
        *writer.inner.failures_left.lock().unwrap() = times;
        writer
    }

    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn contents(&self, path: &Path) -> Option<Bytes> {
        self.inner.files.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl ArtifactWriter for ScriptedWriter {
    async fn write(&self, path: &Path, bytes: Bytes) -> Result<(), WriteError> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        {
            let mut failures = self.inner.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(WriteError::open_failed(
                    path,
                    io::Error::new(io::ErrorKind::PermissionDenied, "scripted"),
                ));
            }
        }
        self.inner
            .files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), bytes);
        Ok(())
    }

    async fn read(&self, path: &Path) -> io::Result<Bytes> {
        self.contents(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not written"))
    }
}

// === Toast Responder ===

/// How the scripted user answers prompts that offer a button.
/// Informational prompts are always dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Button,
    Dismiss,
    Never,
}

/// Answers prompts and forwards every notice to the test.
pub struct ToastResponder {
    seen: mpsc::UnboundedReceiver<ToastNotice>,
}

pub fn toast_responder(answer: Answer) -> (ChannelToastBus, ToastResponder) {
    let (bus, mut notices) = ChannelToastBus::new();
    let (seen_tx, seen) = mpsc::unbounded_channel();
    let answering = bus.clone();

    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            let reply = match notice {
                ToastNotice::Show(ref toast) => match (toast.button.is_some(), answer) {
                    (false, _) => Some((toast.id, ToastResult::Dismissed)),
                    (true, Answer::Button) => Some((toast.id, ToastResult::ButtonSelected)),
                    (true, Answer::Dismiss) => Some((toast.id, ToastResult::Dismissed)),
                    (true, Answer::Never) => None,
                },
                ToastNotice::Dismiss(_) => None,
            };
            let _ = seen_tx.send(notice);
            if let Some((id, result)) = reply {
                answering.respond(id, result);
            }
        }
    });

    (bus, ToastResponder { seen })
}

impl ToastResponder {
    /// The next notice, in the order the engine issued them.
    pub async fn next(&mut self) -> ToastNotice {
        tokio::time::timeout(EVENT_TIMEOUT, self.seen.recv())
            .await
            .expect("timed out waiting for a prompt")
            .expect("toast bus closed")
    }

    /// Notices seen so far that were not consumed yet.
    pub fn drain(&mut self) -> Vec<ToastNotice> {
        let mut out = Vec::new();
        while let Ok(notice) = self.seen.try_recv() {
            out.push(notice);
        }
        out
    }
}

/// Button labels of the prompts shown, `None` for informational prompts.
pub fn buttons(notices: &[ToastNotice]) -> Vec<Option<String>> {
    notices
        .iter()
        .filter_map(|n| match n {
            ToastNotice::Show(toast) => Some(toast.button.clone()),
            ToastNotice::Dismiss(_) => None,
        })
        .collect()
}

// === Engine Helpers ===

pub fn online_probe() -> BearerProbe {
    BearerProbe::with_state(ConnectivityState::from_bearer_name("Ethernet"))
}

pub fn offline_probe() -> BearerProbe {
    BearerProbe::new()
}

/// Platform link whose bearer name the test switches by hand.
#[derive(Clone, Default)]
pub struct FakeLink {
    bearer: Arc<Mutex<String>>,
}

impl FakeLink {
    pub fn set(&self, bearer: &str) {
        *self.bearer.lock().unwrap() = bearer.to_string();
    }
}

impl PlatformProbe for FakeLink {
    fn bearer_type_name(&self) -> io::Result<String> {
        Ok(self.bearer.lock().unwrap().clone())
    }
}

/// Builder wired to the scripted collaborators.
pub fn scripted_engine(
    transport: &ScriptedTransport,
    writer: &ScriptedWriter,
    toasts: ChannelToastBus,
    probe: BearerProbe,
) -> EngineBuilder {
    EngineBuilder::new()
        .transport(transport.clone())
        .writer(writer.clone())
        .toast_bus(toasts)
        .probe(probe)
}

/// Collect events up to and including the first one matching `stop`.
pub async fn collect_until<F>(rx: &mut broadcast::Receiver<HostEvent>, mut stop: F) -> Vec<HostEvent>
where
    F: FnMut(&HostEvent) -> bool,
{
    let collect = async {
        let mut events = Vec::new();
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let done = stop(&event);
                    events.push(event);
                    if done {
                        return events;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => panic!("lagged by {n} events"),
                Err(broadcast::error::RecvError::Closed) => panic!("engine closed"),
            }
        }
    };
    tokio::time::timeout(EVENT_TIMEOUT, collect)
        .await
        .expect("timed out waiting for engine events")
}

/// Events left in the receiver.
pub fn drain(rx: &mut broadcast::Receiver<HostEvent>) -> Vec<HostEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

pub fn states<'a>(events: &'a [HostEvent], id: &'a str) -> impl Iterator<Item = &'a ItemState> {
    events.iter().filter_map(move |e| match e {
        HostEvent::ItemChanged(s) if s.id == id => Some(s),
        _ => None,
    })
}

/// The `(phase, attempt)` sequence of `id`, repeated updates collapsed.
pub fn phases(events: &[HostEvent], id: &str) -> Vec<(Phase, u32)> {
    let mut out: Vec<(Phase, u32)> = states(events, id).map(|s| (s.phase, s.attempt)).collect();
    out.dedup();
    out
}

pub fn last_state(events: &[HostEvent], id: &str) -> ItemState {
    states(events, id).last().cloned().expect("no state for item")
}

/// Largest number of items in an active phase at any point.
pub fn max_active(events: &[HostEvent]) -> usize {
    let mut active = HashSet::new();
    let mut max = 0;
    for event in events {
        if let HostEvent::ItemChanged(s) = event {
            match s.phase.is_active() {
                true => active.insert(s.id.clone()),
                false => active.remove(&s.id),
            };
            max = max.max(active.len());
        }
    }
    max
}

pub fn count_batch_done(events: &[HostEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, HostEvent::BatchDone(_)))
        .count()
}

// === Local HTTP Server ===

/// Status code that makes the server accept the request and never answer.
pub const STALL: u16 = 0;

/// Minimal HTTP/1.1 server answering fixed routes, one request per
/// connection.
pub struct TestServer {
    pub base: Url,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn start(routes: Vec<(&'static str, u16, Vec<u8>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let routes: Arc<HashMap<&'static str, (u16, Vec<u8>)>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, status, body)| (path, (status, body)))
                .collect(),
        );
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = routes.clone();
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&buf);
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                    let (status, body) = routes.get(path.as_str()).cloned().unwrap_or((404, Vec::new()));
                    if status == STALL {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        return;
                    }
                    let reason = match status {
                        200 => "OK",
                        401 => "Unauthorized",
                        404 => "Not Found",
                        _ => "Status",
                    };
                    let head = format!(
                        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        status,
                        reason,
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { base, hits }
    }

    pub fn url(&self, path: &str) -> Url {
        self.base.join(path.trim_start_matches('/')).unwrap()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// HTTP transport that never goes through a system proxy.
pub fn direct_http_transport() -> HttpTransport {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    HttpTransport::new(reqwest_middleware::ClientBuilder::new(client).build())
}

/// A test body of `size` bytes.
pub fn create_test_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Creates a temporary directory for testing purposes
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}
