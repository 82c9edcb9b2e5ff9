//! Transport: one HTTP(S) GET per attempt with progress.
//!
//! - [`sink`] - the [`Transport`] trait, [`TransportSink`], [`TransportHandle`] and resource tracking
//! - [`client`] - middleware client creation
//! - [`http`] - [`HttpTransport`], the reqwest implementation
//! - [`classify`] - mapping of HTTP and client errors to tags

pub mod classify;
pub mod client;
pub mod http;
pub mod sink;

pub use client::{create_http_client, HttpClientConfig};
pub use http::HttpTransport;
pub use sink::{
    ResourceLease, ResourceTracker, Ticket, Transport, TransportEvent, TransportHandle,
    TransportMessage, TransportOutcome, TransportSink,
};
