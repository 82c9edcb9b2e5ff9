//! Builder pattern implementation for spawning engines.
//!
//! [`EngineBuilder`] collects the [`EngineConfig`], HTTP settings and the
//! collaborators of the engine, then spawns the engine task. Every
//! collaborator has a default: the reqwest-based transport, the filesystem
//! writer, a toast bus without a listener and a bearer probe reading the
//! platform.
//!
//! # Examples
//!
//! ## Basic Builder Usage
//!
//! ```rust,no_run
//! use ferry::orchestrator::EngineBuilder;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ferry::Error> {
//! let engine = EngineBuilder::new()
//!     .max_concurrent(4)
//!     .max_retries(3)
//!     .attempt_timeout(Duration::from_secs(30))
//!     .spawn()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Prompts and Event Callbacks
//!
//! ```rust,no_run
//! use ferry::connectivity::{BearerProbe, ConnectivityState};
//! use ferry::orchestrator::{EngineBuilder, HostEvent};
//! use ferry::toast::ChannelToastBus;
//! use reqwest::header::{HeaderValue, USER_AGENT};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ferry::Error> {
//! let (toasts, _notices) = ChannelToastBus::new();
//!
//! let engine = EngineBuilder::new()
//!     .header(USER_AGENT, HeaderValue::from_static("ImageLoader/1.0"))
//!     .toast_bus(toasts)
//!     .probe(BearerProbe::with_state(ConnectivityState::from_bearer_name("WLAN")))
//!     .on_event(|event| {
//!         if let HostEvent::ExitRequested = event {
//!             eprintln!("Giving up");
//!         }
//!     })
//!     .spawn()?;
//! # Ok(())
//! # }
//! ```

use super::config::{EngineConfig, EventCallback};
use super::engine::{Engine, EngineHandle, EVENT_BUFFER};
use super::events::HostEvent;
use super::orchestrator::{Orchestrator, Wiring};
use crate::connectivity::{BearerProbe, ConnectivityState};
use crate::error::Result;
use crate::storage::{ArtifactWriter, FsArtifactWriter};
use crate::toast::{ChannelToastBus, ToastBus};
use crate::transport::{HttpClientConfig, HttpTransport, Transport};

use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// A builder used to spawn an engine.
///
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), ferry::Error> {
/// use ferry::orchestrator::EngineBuilder;
///
/// let engine = EngineBuilder::new().max_retries(5).spawn()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    http: HttpClientConfig,
    transport: Option<Arc<dyn Transport>>,
    writer: Option<Arc<dyn ArtifactWriter>>,
    toasts: Option<Arc<dyn ToastBus>>,
    probe: Option<BearerProbe>,
    on_event: Option<Arc<EventCallback>>,
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("http", &self.http)
            .field("transport", &self.transport.is_some())
            .field("writer", &self.writer.is_some())
            .field("toasts", &self.toasts.is_some())
            .field("probe", &self.probe)
            .field("on_event", &self.on_event.is_some())
            .finish()
    }
}

impl EngineBuilder {
    /// Creates a builder with the default options.
    pub fn new() -> Self {
        EngineBuilder::default()
    }

    /// Creates a builder starting from a loaded configuration.
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set the cap of items holding a slot.
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.config.max_concurrent = max_concurrent;
        self
    }

    /// Set the attempts per item and the prompts per retry scope.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the soft deadline of each transport attempt.
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.config.attempt_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the floor between two byte-count updates of one item.
    pub fn progress_min_interval(mut self, interval: Duration) -> Self {
        self.config.progress_min_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the byte delta that publishes an update regardless of time.
    pub fn progress_min_bytes(mut self, bytes: u64) -> Self {
        self.config.progress_min_bytes = bytes;
        self
    }

    /// Set request-level retries of the default HTTP client.
    pub fn request_retries(mut self, retries: u32) -> Self {
        self.http.retries = retries;
        self
    }

    /// Route the default HTTP client through a proxy.
    pub fn proxy(mut self, proxy: reqwest::Proxy) -> Self {
        self.http.proxy = Some(proxy);
        self
    }

    /// Limit connection establishment of the default HTTP client.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.http.connect_timeout = Some(timeout);
        self
    }

    /// Helper method to get or create a new HeaderMap.
    fn new_header(&self) -> HeaderMap {
        match self.http.headers {
            Some(ref h) => h.to_owned(),
            _ => HeaderMap::new(),
        }
    }

    /// Add http headers sent with every request.
    ///
    /// Calling `.headers()` multiple times merges all maps into one.
    ///
    /// See also [`header()`].
    ///
    /// [`header()`]: EngineBuilder::header
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        let mut new = self.new_header();
        new.extend(headers);

        self.http.headers = Some(new);
        self
    }

    /// Add one http header sent with every request.
    ///
    /// ```
    /// use reqwest::header::{self, HeaderValue};
    /// use ferry::orchestrator::EngineBuilder;
    ///
    /// let builder = EngineBuilder::new()
    ///     .header(header::USER_AGENT, HeaderValue::from_static("ImageLoader/1.0"))
    ///     .header(header::ACCEPT, HeaderValue::from_static("image/*"));
    /// ```
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        let mut new = self.new_header();

        new.insert(name, value);

        self.http.headers = Some(new);
        self
    }

    /// Replace the HTTP transport. HTTP settings are then ignored.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Replace the filesystem writer.
    pub fn writer(mut self, writer: impl ArtifactWriter + 'static) -> Self {
        self.writer = Some(Arc::new(writer));
        self
    }

    /// Set the surface prompts are shown on.
    ///
    /// Without one, every prompt counts as dismissed and the first
    /// user-facing failure gives up.
    pub fn toast_bus(mut self, toasts: impl ToastBus + 'static) -> Self {
        self.toasts = Some(Arc::new(toasts));
        self
    }

    /// Set the bearer probe gating dispatch.
    pub fn probe(mut self, probe: BearerProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Set a callback invoked with every host event, before it reaches
    /// subscribers.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(&HostEvent) + Send + Sync + 'static,
    {
        self.on_event = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Spawn the engine on the current tokio runtime.
    pub fn spawn(self) -> Result<EngineHandle> {
        self.config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_config(self.http)?),
        };
        let writer: Arc<dyn ArtifactWriter> = match self.writer {
            Some(writer) => writer,
            None => Arc::new(FsArtifactWriter::new()),
        };
        let toasts: Arc<dyn ToastBus> = match self.toasts {
            Some(toasts) => toasts,
            None => Arc::new(ChannelToastBus::new().0),
        };
        let probe = self.probe.unwrap_or_else(default_probe);

        let (connectivity_tx, connectivity_rx) = mpsc::unbounded_channel();
        probe.subscribe(move |state: &ConnectivityState| {
            let _ = connectivity_tx.send(*state);
        });

        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let orchestrator = Orchestrator::new(
            self.config,
            Wiring {
                transport,
                writer,
                toasts,
                transport_tx,
                input_tx,
                probe: probe.clone(),
            },
            probe.current(),
        );

        let engine = Engine {
            orchestrator,
            commands: command_rx,
            inputs: input_rx,
            transport: transport_rx,
            connectivity: connectivity_rx,
            events,
            on_event: self.on_event,
            _probe: probe.clone(),
            waiters: HashMap::new(),
        };
        tokio::spawn(engine.run());

        Ok(EngineHandle::new(command_tx, probe))
    }
}

#[cfg(target_os = "linux")]
fn default_probe() -> BearerProbe {
    BearerProbe::with_platform(crate::connectivity::SysfsProbe::default())
}

#[cfg(not(target_os = "linux"))]
fn default_probe() -> BearerProbe {
    // No platform query: assume a working link until the host says otherwise.
    BearerProbe::with_state(ConnectivityState {
        online: true,
        bearer: crate::connectivity::BearerTag::Unknown,
    })
}
