//! The per-scope retry state machine.
//!
//! [`RetryController`] performs no I/O. Every input returns the
//! [`Directive`]s the caller must carry out: prompts to show or withdraw and
//! events to act upon. The orchestrator executes them after its own state
//! has settled, so the controller is never re-entered mid-update.

use super::ledger::{RetryLedger, Scope};
use crate::toast::{Toast, ToastId, ToastResult};

use serde::Serialize;
use tracing::debug;

/// Decision surfaced by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RetryEvent {
    /// The user asked for another attempt.
    Retry { scope: Scope, attempt: u32 },
    /// The user dismissed the prompt.
    GiveUp { scope: Scope },
    /// The connection came back while a prompt was displayed.
    Recovered { scope: Scope },
    /// The scope has run out of options.
    TerminalFailure { scope: Scope },
    /// The final prompt ended; the host should exit.
    ExitRequested { scope: Scope },
}

/// Side effect the caller executes on the controller's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Show(Toast),
    Cancel(ToastId),
    Notify(RetryEvent),
}

/// Where a scope stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Idle,
    /// Waiting on the user to answer `toast`.
    Prompting { toast: ToastId },
    /// Given up. `toast` is the final prompt until it has been answered.
    Terminal { toast: Option<ToastId> },
}

/// Bounded, user-mediated retries for the [`Scope`]s.
#[derive(Debug)]
pub struct RetryController {
    ledger: RetryLedger,
    states: [ScopeState; 2],
    next_toast: u64,
}

impl RetryController {
    pub fn new(max_retries: u32) -> Self {
        Self {
            ledger: RetryLedger::new(max_retries),
            states: [ScopeState::Idle; 2],
            next_toast: 1,
        }
    }

    pub fn ledger(&self) -> &RetryLedger {
        &self.ledger
    }

    pub fn state(&self, scope: Scope) -> ScopeState {
        self.states[scope.index()]
    }

    pub fn is_prompting(&self, scope: Scope) -> bool {
        matches!(self.state(scope), ScopeState::Prompting { .. })
    }

    pub fn is_terminal(&self, scope: Scope) -> bool {
        matches!(self.state(scope), ScopeState::Terminal { .. })
    }

    /// An operation in `scope` failed.
    ///
    /// Failures arriving while a prompt is already displayed are folded
    /// into it.
    pub fn on_failure(&mut self, scope: Scope) -> Vec<Directive> {
        match self.state(scope) {
            ScopeState::Idle if self.ledger.has_remaining(scope) => {
                let k = self.ledger.increment(scope);
                let id = self.allocate_toast();
                debug!("{} failure {} of {}", scope, k, self.ledger.max());
                self.set(scope, ScopeState::Prompting { toast: id });
                vec![Directive::Show(Toast::with_button(
                    id,
                    scope.message(),
                    format!("Retry {} of {}", k, self.ledger.max()),
                ))]
            }
            ScopeState::Idle => self.give_up(scope),
            ScopeState::Prompting { .. } | ScopeState::Terminal { .. } => Vec::new(),
        }
    }

    /// An operation in `scope` succeeded.
    pub fn on_success(&mut self, scope: Scope) -> Vec<Directive> {
        let mut directives = Vec::new();
        match self.state(scope) {
            ScopeState::Terminal { .. } => return directives,
            ScopeState::Prompting { toast } => directives.push(Directive::Cancel(toast)),
            ScopeState::Idle => {}
        }
        self.ledger.reset(scope);
        self.set(scope, ScopeState::Idle);
        directives
    }

    /// Withdraw the prompt of `scope` without answering it. The ledger is
    /// kept, so the next failure continues the count.
    pub fn withdraw(&mut self, scope: Scope) -> Vec<Directive> {
        match self.state(scope) {
            ScopeState::Prompting { toast } => {
                self.set(scope, ScopeState::Idle);
                vec![Directive::Cancel(toast)]
            }
            _ => Vec::new(),
        }
    }

    /// The bearer probe reported the link as usable again.
    pub fn on_online(&mut self) -> Vec<Directive> {
        let scope = Scope::Connection;
        match self.state(scope) {
            ScopeState::Terminal { .. } => Vec::new(),
            ScopeState::Idle => {
                self.ledger.reset(scope);
                Vec::new()
            }
            ScopeState::Prompting { toast } => {
                debug!("Connection recovered, withdrawing {}", toast);
                self.ledger.reset(scope);
                self.set(scope, ScopeState::Idle);
                vec![
                    Directive::Cancel(toast),
                    Directive::Notify(RetryEvent::Recovered { scope }),
                ]
            }
        }
    }

    /// A prompt ended. Answers for prompts the controller no longer waits
    /// on are ignored.
    pub fn on_toast_result(&mut self, id: ToastId, result: ToastResult) -> Vec<Directive> {
        let Some(scope) = Scope::ALL.into_iter().find(|s| self.owns(*s, id)) else {
            debug!("Ignoring {:?} for stale {}", result, id);
            return Vec::new();
        };

        match (self.state(scope), result) {
            (ScopeState::Terminal { .. }, _) => {
                self.set(scope, ScopeState::Terminal { toast: None });
                vec![Directive::Notify(RetryEvent::ExitRequested { scope })]
            }
            (ScopeState::Prompting { .. }, ToastResult::ButtonSelected) => {
                if self.ledger.has_remaining(scope) {
                    self.set(scope, ScopeState::Idle);
                    vec![Directive::Notify(RetryEvent::Retry {
                        scope,
                        attempt: self.ledger.get(scope) + 1,
                    })]
                } else {
                    self.give_up(scope)
                }
            }
            (ScopeState::Prompting { .. }, ToastResult::Dismissed | ToastResult::Cancelled) => {
                let mut directives = vec![Directive::Notify(RetryEvent::GiveUp { scope })];
                directives.extend(self.give_up(scope));
                directives
            }
            (ScopeState::Idle, _) => Vec::new(),
        }
    }

    fn give_up(&mut self, scope: Scope) -> Vec<Directive> {
        let id = self.allocate_toast();
        debug!("{} gave up", scope);
        self.set(scope, ScopeState::Terminal { toast: Some(id) });
        vec![
            Directive::Notify(RetryEvent::TerminalFailure { scope }),
            Directive::Show(Toast::informational(id, scope.final_message())),
        ]
    }

    fn owns(&self, scope: Scope, id: ToastId) -> bool {
        match self.state(scope) {
            ScopeState::Prompting { toast } => toast == id,
            ScopeState::Terminal { toast } => toast == Some(id),
            ScopeState::Idle => false,
        }
    }

    fn allocate_toast(&mut self) -> ToastId {
        let id = ToastId(self.next_toast);
        self.next_toast += 1;
        id
    }

    fn set(&mut self, scope: Scope, state: ScopeState) {
        self.states[scope.index()] = state;
    }
}
