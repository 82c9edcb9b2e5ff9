//! The bearer probe: last known connectivity plus ordered transition delivery.
//!
//! The probe does not poll. Hosts feed it either raw bearer names from their
//! platform notifications ([`BearerProbe::os_bearer_changed`]) or ask it to
//! query a [`PlatformProbe`] ([`BearerProbe::refresh`]).
//!
//! # Examples
//!
//! ```rust
//! use ferry::connectivity::{BearerProbe, BearerTag};
//! use std::sync::{Arc, Mutex};
//!
//! let probe = BearerProbe::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! probe.subscribe(move |state| sink.lock().unwrap().push(state.bearer));
//!
//! probe.os_bearer_changed("WLAN");
//! probe.os_bearer_changed("WLAN"); // not a transition
//! probe.os_bearer_changed("");
//!
//! assert_eq!(*seen.lock().unwrap(), vec![BearerTag::Wifi, BearerTag::None]);
//! assert!(!probe.current().online);
//! ```

use super::bearer::ConnectivityState;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, warn};

/// Callback type for connectivity transitions.
pub type ConnectivityCallback = Box<dyn Fn(&ConnectivityState) + Send + Sync>;

/// Source of the platform's current bearer name ("WLAN", "Ethernet", ...).
///
/// An empty name means no interface is active.
pub trait PlatformProbe: Send + Sync {
    /// Name of the bearer carrying the default route.
    fn bearer_type_name(&self) -> io::Result<String>;
}

struct Inner {
    state: RwLock<ConnectivityState>,
    // Held for the whole update-and-deliver step so deliveries keep the
    // order in which transitions were applied.
    observers: Mutex<Vec<ConnectivityCallback>>,
    platform: Option<Box<dyn PlatformProbe>>,
}

/// Current network reachability, shared by reference.
///
/// Observers are invoked synchronously, in transition order, from the thread
/// that applied the transition. They must not call [`BearerProbe::subscribe`]
/// themselves.
#[derive(Clone)]
pub struct BearerProbe {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for BearerProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerProbe")
            .field("state", &self.current())
            .field("platform", &self.inner.platform.is_some())
            .finish()
    }
}

impl Default for BearerProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl BearerProbe {
    /// A probe fed only by the host, starting offline.
    pub fn new() -> Self {
        Self::with_state(ConnectivityState::degraded())
    }

    /// A probe fed only by the host, starting at `state`.
    pub fn with_state(state: ConnectivityState) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(state),
                observers: Mutex::new(Vec::new()),
                platform: None,
            }),
        }
    }

    /// A probe backed by a platform query. The initial state is read
    /// immediately.
    pub fn with_platform(platform: impl PlatformProbe + 'static) -> Self {
        let initial = query(&platform);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(initial),
                observers: Mutex::new(Vec::new()),
                platform: Some(Box::new(platform)),
            }),
        }
    }

    /// Non-blocking snapshot of the last known state.
    pub fn current(&self) -> ConnectivityState {
        *self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an observer for every subsequent transition.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&ConnectivityState) + Send + Sync + 'static,
    {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(observer));
    }

    /// Apply a raw bearer name reported by the platform.
    ///
    /// Returns `true` when this was a transition.
    pub fn os_bearer_changed(&self, raw: &str) -> bool {
        self.apply(ConnectivityState::from_bearer_name(raw))
    }

    /// Re-query the platform probe. Without one, the last state is kept.
    pub fn refresh(&self) -> ConnectivityState {
        if let Some(ref platform) = self.inner.platform {
            self.apply(query(platform.as_ref()));
        }
        self.current()
    }

    /// Apply a new state, delivering it to observers if it differs.
    pub fn apply(&self, next: ConnectivityState) -> bool {
        let observers = self
            .inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if *state == next {
                return false;
            }
            *state = next;
        }

        debug!(online = next.online, bearer = %next.bearer, "Connectivity changed");
        for observer in observers.iter() {
            observer(&next);
        }
        true
    }
}

fn query(platform: &dyn PlatformProbe) -> ConnectivityState {
    match platform.bearer_type_name() {
        Ok(raw) => ConnectivityState::from_bearer_name(&raw),
        Err(e) => {
            warn!("Bearer probe failed: {}", e);
            ConnectivityState::degraded()
        }
    }
}

/// Reads interface state from the Linux sysfs network class.
///
/// The first interface (in name order) whose `operstate` is `up` wins.
/// Loopback is ignored.
#[derive(Debug, Clone)]
pub struct SysfsProbe {
    root: PathBuf,
}

impl Default for SysfsProbe {
    fn default() -> Self {
        Self::new("/sys/class/net")
    }
}

impl SysfsProbe {
    /// Probe the interfaces found under `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn classify(iface: &Path, name: &str) -> String {
        if iface.join("wireless").exists() || iface.join("phy80211").exists() {
            return "WLAN".into();
        }
        if name.starts_with("bnep") {
            return "Bluetooth".into();
        }
        if name.starts_with("wwan") || name.starts_with("rmnet") {
            return "WCDMA".into();
        }
        match fs::read_to_string(iface.join("type")) {
            // ARPHRD_ETHER
            Ok(t) if t.trim() == "1" => "Ethernet".into(),
            _ => name.to_string(),
        }
    }
}

impl PlatformProbe for SysfsProbe {
    fn bearer_type_name(&self) -> io::Result<String> {
        let mut names = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "lo")
            .collect::<Vec<_>>();
        names.sort();

        for name in names {
            let iface = self.root.join(&name);
            let up = fs::read_to_string(iface.join("operstate"))
                .map(|s| s.trim() == "up")
                .unwrap_or(false);
            if up {
                return Ok(Self::classify(&iface, &name));
            }
        }
        Ok(String::new())
    }
}
