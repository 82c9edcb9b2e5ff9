//! Bearer classification.

use serde::Serialize;
use std::fmt;

/// The kind of link the device is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BearerTag {
    /// Wired network.
    Ethernet,
    /// WLAN or WiMAX.
    Wifi,
    /// Any mobile data bearer.
    Cellular,
    /// Bluetooth tethering.
    Bluetooth,
    /// No active interface.
    None,
    /// An interface the platform reported but we do not recognise.
    #[default]
    Unknown,
}

impl BearerTag {
    /// Classify the bearer name reported by the platform.
    ///
    /// ```rust
    /// use ferry::connectivity::BearerTag;
    ///
    /// assert_eq!(BearerTag::from_bearer_name("WLAN"), BearerTag::Wifi);
    /// assert_eq!(BearerTag::from_bearer_name("HSPA"), BearerTag::Cellular);
    /// assert_eq!(BearerTag::from_bearer_name(""), BearerTag::None);
    /// assert_eq!(BearerTag::from_bearer_name("LTE"), BearerTag::Unknown);
    /// ```
    pub fn from_bearer_name(name: &str) -> Self {
        match name {
            "Ethernet" => BearerTag::Ethernet,
            "WLAN" | "WiMAX" => BearerTag::Wifi,
            "2G" | "CDMA2000" | "WCDMA" | "HSPA" => BearerTag::Cellular,
            "Bluetooth" => BearerTag::Bluetooth,
            "" => BearerTag::None,
            _ => BearerTag::Unknown,
        }
    }

    /// Snake-case tag.
    pub fn as_str(self) -> &'static str {
        match self {
            BearerTag::Ethernet => "ethernet",
            BearerTag::Wifi => "wifi",
            BearerTag::Cellular => "cellular",
            BearerTag::Bluetooth => "bluetooth",
            BearerTag::None => "none",
            BearerTag::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BearerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectivityState {
    /// Whether any interface is usable.
    pub online: bool,
    /// Which bearer carries the traffic.
    pub bearer: BearerTag,
}

impl ConnectivityState {
    /// Derive the state from a raw bearer name. An empty name means offline.
    pub fn from_bearer_name(raw: &str) -> Self {
        let raw = raw.trim();
        Self {
            online: !raw.is_empty(),
            bearer: BearerTag::from_bearer_name(raw),
        }
    }

    /// What a failing probe degrades to.
    pub fn degraded() -> Self {
        Self {
            online: false,
            bearer: BearerTag::Unknown,
        }
    }
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self::degraded()
    }
}
