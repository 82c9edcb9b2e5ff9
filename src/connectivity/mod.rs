//! Connectivity: bearer classification and the bearer probe.
//!
//! - [`bearer`] - [`BearerTag`] and [`ConnectivityState`]
//! - [`probe`] - [`BearerProbe`], the [`PlatformProbe`] seam and [`SysfsProbe`]

pub mod bearer;
pub mod probe;

pub use bearer::{BearerTag, ConnectivityState};
pub use probe::{BearerProbe, ConnectivityCallback, PlatformProbe, SysfsProbe};
