//! Progress bar styling and configuration options.
//!
//! A [`ProgressDisplay`](super::ProgressDisplay) shows one main bar counting
//! finished items and one child bar per running transfer.
//!
//! # Examples
//!
//! ```rust
//! use ferry::progress::{ProgressBarOpts, StyleOptions};
//!
//! // Default styling: the main bar stays, transfer bars clear when done.
//! assert!(StyleOptions::default().is_enabled());
//!
//! // Only the item counter.
//! let quiet = StyleOptions::new(ProgressBarOpts::items(), ProgressBarOpts::hidden());
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

/// Bars drawn by a progress display.
#[derive(Debug, Clone)]
pub struct StyleOptions {
    /// Item counter.
    pub(crate) main: ProgressBarOpts,
    /// One bar per running transfer.
    pub(crate) child: ProgressBarOpts,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            main: ProgressBarOpts::items(),
            child: ProgressBarOpts::transfer(),
        }
    }
}

impl StyleOptions {
    pub fn new(main: ProgressBarOpts, child: ProgressBarOpts) -> Self {
        Self { main, child }
    }

    /// Hide every bar. Notices are still printed.
    pub fn hidden() -> Self {
        Self::new(ProgressBarOpts::hidden(), ProgressBarOpts::hidden())
    }

    /// Whether any bar is drawn at all.
    pub fn is_enabled(&self) -> bool {
        self.main.enabled || self.child.enabled
    }

    pub fn main(&self) -> &ProgressBarOpts {
        &self.main
    }

    pub fn child(&self) -> &ProgressBarOpts {
        &self.child
    }
}

/// Template, characters and visibility of one kind of bar.
#[derive(Debug, Clone)]
pub struct ProgressBarOpts {
    /// indicatif template, see [`ProgressStyle::with_template`].
    template: Option<String>,
    progress_chars: Option<String>,
    pub(crate) enabled: bool,
    /// Drop the bar from the screen when it finishes.
    pub(crate) clear: bool,
}

impl Default for ProgressBarOpts {
    fn default() -> Self {
        Self {
            template: None,
            progress_chars: None,
            enabled: true,
            clear: true,
        }
    }
}

impl ProgressBarOpts {
    /// Finished items over submitted items.
    ///
    /// `████████████████████░░░░░░░░░░░░░░░░░░░░ 3/6 items`
    pub const TEMPLATE_ITEMS: &'static str = "{bar:40.blue} {pos:>}/{len} items {msg}";
    /// One transfer, labelled with the item id and phase.
    ///
    /// `a.png [downloading] ━━━━━━━╾──────── 48.00 KiB/96.00 KiB 1.20 MiB/s`
    pub const TEMPLATE_TRANSFER: &'static str =
        "{msg:32} {bar:30.green/black} {bytes:>10}/{total_bytes:<10} {bytes_per_sec:.red}";
    /// Block characters for the item counter.
    pub const CHARS_FINE: &'static str = "█▉▊▋▌▍▎▏  ";
    /// Line characters for transfer bars.
    pub const CHARS_LINE: &'static str = "━╾╴─";

    pub fn new(
        template: Option<String>,
        progress_chars: Option<String>,
        enabled: bool,
        clear: bool,
    ) -> Self {
        Self {
            template,
            progress_chars,
            enabled,
            clear,
        }
    }

    /// The item counter kept on screen once done.
    pub fn items() -> Self {
        Self {
            template: Some(Self::TEMPLATE_ITEMS.into()),
            progress_chars: Some(Self::CHARS_FINE.into()),
            enabled: true,
            clear: false,
        }
    }

    /// A byte-level transfer bar cleared once done.
    pub fn transfer() -> Self {
        Self {
            template: Some(Self::TEMPLATE_TRANSFER.into()),
            progress_chars: Some(Self::CHARS_LINE.into()),
            enabled: true,
            clear: true,
        }
    }

    /// Never drawn.
    pub fn hidden() -> Self {
        Self {
            enabled: false,
            ..ProgressBarOpts::default()
        }
    }

    /// An invalid template is logged and replaced by the default bar.
    pub fn to_progress_style(&self) -> ProgressStyle {
        let mut style = match self.template {
            Some(ref template) => ProgressStyle::with_template(template).unwrap_or_else(|e| {
                warn!("Invalid progress template {:?}: {}", template, e);
                ProgressStyle::default_bar()
            }),
            None => ProgressStyle::default_bar(),
        };
        if let Some(ref progress_chars) = self.progress_chars {
            style = style.progress_chars(progress_chars);
        }
        style
    }

    /// A hidden bar when disabled.
    pub fn to_progress_bar(&self, len: u64) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }
        ProgressBar::new(len).with_style(self.to_progress_style())
    }
}
