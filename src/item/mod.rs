//! Items, batches and the observable per-item state.
//!
//! - [`item`] - [`Item`], [`Batch`] and [`BatchId`]
//! - [`state`] - [`ItemState`], its [`Phase`] and the [`ErrorKind`] tags

pub mod item;
pub mod state;

pub use item::{Batch, BatchId, Item};
pub use state::{ErrorKind, ItemState, Phase};
