//! Ferry is a headless engine for resilient concurrent HTTP(S) downloads
//! with observable per-item progress.
//!
//! Items are fetched concurrently under a cap, transient failures are
//! retried automatically, connectivity loss and storage failures go through
//! bounded, user-mediated retry prompts, and every change is published as a
//! [`HostEvent`] with a monotone per-item [`ItemState`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ferry::{Batch, EngineBuilder, Error, Item};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Error> {
//! let engine = EngineBuilder::new().max_concurrent(4).spawn()?;
//!
//! let batch = Batch::new(vec![
//!     Item::try_from("https://example.com/images/a.png")?,
//!     Item::try_from("https://example.com/model.xml")?.with_destination("data/model.xml"),
//! ]);
//! for state in engine.download(batch).await? {
//!     println!("{} {} {:?}", state.id, state.phase, state.last_error_kind);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`item`] - [`Item`], [`Batch`] and the observable [`ItemState`]
//! - [`connectivity`] - the bearer probe and its platform seam
//! - [`transport`] - the transport contract and the reqwest-based transport
//! - [`storage`] - persisting payloads
//! - [`retry`] - the per-scope retry ledger and state machine
//! - [`toast`] - the prompt surface
//! - [`progress`] - the progress model, throttle and console display
//! - [`orchestrator`] - the engine, its builder and configuration
//! - [`catalog`] - fetching and reading back the XML catalog
//! - [`error`] - Centralized error handling with the `Error` enum

pub mod catalog;
pub mod connectivity;
pub mod error;
pub mod item;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod storage;
pub mod toast;
pub mod transport;

pub use connectivity::{BearerProbe, BearerTag, ConnectivityState};
pub use error::{Error, Result};
pub use item::{Batch, BatchId, ErrorKind, Item, ItemState, Phase};
pub use orchestrator::{EngineBuilder, EngineConfig, EngineHandle, HostEvent};
pub use progress::{ProgressBarOpts, ProgressDisplay, StyleOptions};
pub use reqwest::Url;
pub use toast::{ChannelToastBus, Toast, ToastBus, ToastId, ToastResult};
