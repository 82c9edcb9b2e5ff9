//! Bounded, user-mediated retries.
//!
//! Two [`Scope`]s keep independent counters in a [`RetryLedger`]. A failure
//! shows a prompt through the [toast bus](crate::toast); the user's answer
//! turns into a [`RetryEvent`]. Connection prompts also resolve on their own
//! when the [bearer probe](crate::connectivity) reports the link as online.
//!
//! ```rust
//! use ferry::retry::{Directive, RetryController, RetryEvent, Scope};
//! use ferry::toast::ToastResult;
//!
//! let mut retry = RetryController::new(3);
//! let Directive::Show(toast) = &retry.on_failure(Scope::Connection)[0] else { unreachable!() };
//! assert_eq!(toast.button.as_deref(), Some("Retry 1 of 3"));
//!
//! let next = retry.on_toast_result(toast.id, ToastResult::ButtonSelected);
//! assert_eq!(next, [Directive::Notify(RetryEvent::Retry { scope: Scope::Connection, attempt: 2 })]);
//! ```

mod controller;
mod ledger;

pub use controller::{Directive, RetryController, RetryEvent, ScopeState};
pub use ledger::{RetryLedger, Scope};
