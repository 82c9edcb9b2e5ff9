//! Orchestrator module: scheduling, retries and the engine task.
//!
//! # Overview
//!
//! - `config` - [`EngineConfig`] and the event callback type
//! - `builder` - [`EngineBuilder`] for configuring and spawning an engine
//! - `engine` - the engine task and its [`EngineHandle`]
//! - `events` - [`HostEvent`]s emitted to the host
//!
//! The dispatch core itself is private: hosts only talk to it through
//! [`EngineHandle`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferry::item::{Batch, Item};
//! use ferry::orchestrator::{EngineBuilder, HostEvent};
//! use std::convert::TryFrom;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ferry::Error> {
//! let engine = EngineBuilder::new().spawn()?;
//! let (snapshot, mut events) = engine.subscribe().await?;
//! assert!(snapshot.is_empty());
//!
//! let batch = engine
//!     .submit(Batch::new(vec![Item::try_from("https://example.com/a.png")?]))
//!     .await?;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         HostEvent::ItemChanged(state) => println!("{} {}", state.id, state.phase),
//!         HostEvent::BatchDone(done) if done == batch => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod engine;
pub mod events;
mod orchestrator;

pub use builder::EngineBuilder;
pub use config::{EngineConfig, EventCallback};
pub use engine::EngineHandle;
pub use events::HostEvent;
