//! Console rendering of engine events.
//!
//! [`ProgressDisplay`] turns [`HostEvent`]s into indicatif bars and prints
//! prompts and connectivity changes above them. It is a host adapter: the
//! engine never depends on it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferry::orchestrator::{EngineBuilder, HostEvent};
//! use ferry::progress::{ProgressDisplay, StyleOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ferry::Error> {
//! let engine = EngineBuilder::new().spawn()?;
//! let (_, mut events) = engine.subscribe().await?;
//! let mut display = ProgressDisplay::new(StyleOptions::default(), 2);
//!
//! while let Ok(event) = events.recv().await {
//!     display.handle(&event);
//!     if let HostEvent::BatchDone(_) = event {
//!         break;
//!     }
//! }
//! display.finish();
//! # Ok(())
//! # }
//! ```

use crate::item::{ItemState, Phase};
use crate::orchestrator::HostEvent;
use crate::progress::StyleOptions;
use crate::toast::ToastNotice;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use std::collections::HashMap;

/// Console rendering of host events: an item counter plus one bar per transfer.
pub struct ProgressDisplay {
    multi: MultiProgress,
    /// Finished items over submitted items.
    main: ProgressBar,
    /// One bar per item that has not finished.
    bars: HashMap<String, ProgressBar>,
    style_options: StyleOptions,
}

impl std::fmt::Debug for ProgressDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressDisplay")
            .field("bars", &self.bars.len())
            .field("style_options", &self.style_options)
            .finish()
    }
}

impl ProgressDisplay {
    /// Create a display expecting `total_items` items.
    pub fn new(style_options: StyleOptions, total_items: usize) -> Self {
        let multi = match style_options.is_enabled() {
            true => MultiProgress::new(),
            false => MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        };
        let main = multi.add(style_options.main().to_progress_bar(total_items as u64));
        main.tick();

        Self {
            multi,
            main,
            bars: HashMap::new(),
            style_options,
        }
    }

    /// Expect `count` more items.
    pub fn add_items(&self, count: usize) {
        self.main.inc_length(count as u64);
    }

    /// Number of items with a visible transfer bar.
    pub fn live_bars(&self) -> usize {
        self.bars.len()
    }

    /// Position of the main bar.
    pub fn finished_items(&self) -> u64 {
        self.main.position()
    }

    /// Render one engine event.
    pub fn handle(&mut self, event: &HostEvent) {
        match event {
            HostEvent::ItemChanged(state) => self.item_changed(state),
            HostEvent::Connectivity(state) => {
                let line = match state.online {
                    true => style(format!("Online via {}", state.bearer)).dim(),
                    false => style("Offline".to_string()).yellow(),
                };
                self.print(line.to_string());
            }
            HostEvent::PayloadReady { id, payload } => {
                self.print(format!("{} {} ({} bytes)", style("↓").green(), id, payload.len()));
            }
            HostEvent::BatchDone(batch) => {
                self.print(style(format!("{} complete", batch)).green().to_string());
            }
            HostEvent::ExitRequested => {
                self.print(style("Exit requested").red().bold().to_string());
            }
        }
    }

    /// Render a prompt notice from a [`ChannelToastBus`](crate::toast::ChannelToastBus).
    pub fn notice(&self, notice: &ToastNotice) {
        match notice {
            ToastNotice::Show(toast) => {
                let line = match toast.button {
                    Some(ref button) => format!(
                        "{} {} [{}]",
                        style("!").yellow().bold(),
                        toast.body,
                        style(button).cyan()
                    ),
                    None => format!("{} {}", style("!").red().bold(), toast.body),
                };
                self.print(line);
            }
            ToastNotice::Dismiss(id) => {
                self.print(style(format!("{} withdrawn", id)).dim().to_string());
            }
        }
    }

    fn item_changed(&mut self, state: &ItemState) {
        if state.phase == Phase::Queued && state.attempt > 1 {
            // The failed attempt was counted as finished.
            self.main
                .set_position(self.main.position().saturating_sub(1));
        }

        let bar = self.bar(&state.id);
        if state.bytes_total > 0 {
            bar.set_length(state.bytes_total);
        }
        bar.set_position(state.bytes_received);
        bar.set_message(match state.attempt {
            1 => format!("{} [{}]", state.id, state.phase),
            n => format!("{} [{} #{}]", state.id, state.phase, n),
        });

        if !state.phase.is_terminal() {
            return;
        }
        self.main.inc(1);
        if state.phase == Phase::Failed {
            let kind = state
                .last_error_kind
                .map(|k| k.to_string())
                .unwrap_or_default();
            self.print(format!("{} {} {}", style("✗").red(), state.id, style(kind).red()));
        }
        if let Some(bar) = self.bars.remove(&state.id) {
            match self.style_options.child().clear {
                true => bar.finish_and_clear(),
                false => bar.finish(),
            }
        }
    }

    fn bar(&mut self, id: &str) -> &ProgressBar {
        if !self.bars.contains_key(id) {
            let bar = self
                .multi
                .add(self.style_options.child().to_progress_bar(0));
            self.bars.insert(id.to_string(), bar);
        }
        &self.bars[id]
    }

    fn print(&self, line: String) {
        let _ = self.multi.println(line);
    }

    /// Finish every remaining bar, honoring each bar's `clear` option.
    pub fn finish(self) {
        for bar in self.bars.into_values() {
            bar.finish_and_clear();
        }
        match self.style_options.main().clear {
            true => self.main.finish_and_clear(),
            false => self.main.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ErrorKind;

    fn at(phase: Phase, attempt: u32) -> HostEvent {
        HostEvent::ItemChanged(ItemState {
            phase,
            attempt,
            last_error_kind: (phase == Phase::Failed).then_some(ErrorKind::Timeout),
            ..ItemState::queued("a")
        })
    }

    #[test]
    fn test_counts_finished_items() {
        let mut display = ProgressDisplay::new(StyleOptions::hidden(), 1);
        display.handle(&at(Phase::Queued, 1));
        display.handle(&at(Phase::Connecting, 1));
        assert_eq!(display.live_bars(), 1);

        // A retried failure does not count.
        display.handle(&at(Phase::Failed, 1));
        display.handle(&at(Phase::Queued, 2));
        assert_eq!(display.finished_items(), 0);

        display.handle(&at(Phase::Done, 2));
        assert_eq!(display.finished_items(), 1);
        assert_eq!(display.live_bars(), 0);
        display.finish();
    }
}
