//! Progress module: the observable model and its console rendering.
//!
//! # Overview
//!
//! - `model` - [`ProgressModel`], the ordered record of every item
//! - `throttle` - [`ProgressThrottle`], the time-or-bytes rate limit applied
//!   before updates reach the model
//! - `style` - Progress bar styling options and templates
//! - `display` - [`ProgressDisplay`], renders host events on the console
//!
//! # Examples
//!
//! ```rust
//! use ferry::item::{ItemState, Phase};
//! use ferry::progress::ProgressModel;
//!
//! let mut model = ProgressModel::new();
//! model.insert(ItemState::queued("a.png"))?;
//! model.update(ItemState { phase: Phase::Connecting, ..ItemState::queued("a.png") })?;
//!
//! // Phases never go backwards.
//! assert!(model.update(ItemState::queued("a.png")).is_err());
//! # Ok::<(), ferry::Error>(())
//! ```

pub(crate) mod display;
pub(crate) mod model;
pub(crate) mod style;
pub(crate) mod throttle;

pub use display::ProgressDisplay;
pub use model::ProgressModel;
pub use style::{ProgressBarOpts, StyleOptions};
pub use throttle::ProgressThrottle;
