//! Tests for the progress module functionality.
//!
//! This file contains tests for the progress model, the throttle, bar
//! styling and the console display.

use bytes::Bytes;
use ferry::item::{ErrorKind, ItemState, Phase};
use ferry::orchestrator::HostEvent;
use ferry::progress::{ProgressBarOpts, ProgressDisplay, ProgressModel, ProgressThrottle, StyleOptions};
use ferry::toast::{Toast, ToastId, ToastNotice};
use ferry::Error;
use std::time::{Duration, Instant};

fn at(id: &str, phase: Phase, received: u64, total: u64, attempt: u32) -> ItemState {
    ItemState {
        phase,
        bytes_received: received,
        bytes_total: total,
        attempt,
        ..ItemState::queued(id)
    }
}

// === Progress Model ===

#[test]
fn test_model_keeps_submission_order() {
    let mut model = ProgressModel::new();
    for id in ["c", "a", "b"] {
        model.insert(ItemState::queued(id)).unwrap();
    }
    let ids: Vec<&str> = model.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
    assert_eq!(model.len(), 3);
}

#[test]
fn test_model_accepts_a_full_lifecycle() {
    let mut model = ProgressModel::new();
    model.insert(ItemState::queued("a")).unwrap();

    let sequence = [
        at("a", Phase::Connecting, 0, 0, 1),
        at("a", Phase::Downloading, 10, 100, 1),
        ItemState {
            last_error_kind: Some(ErrorKind::ConnectionLost),
            ..at("a", Phase::Failed, 10, 100, 1)
        },
        at("a", Phase::Queued, 0, 0, 2),
        at("a", Phase::Connecting, 0, 0, 2),
        at("a", Phase::Downloading, 100, 100, 2),
        at("a", Phase::Writing, 100, 100, 2),
        at("a", Phase::Done, 100, 100, 2),
    ];
    for state in sequence {
        model.update(state).unwrap();
    }
    assert_eq!(model.get("a").unwrap().phase, Phase::Done);
    assert!(!model.is_live("a"));
}

#[test]
fn test_model_rejects_regressions() {
    let mut model = ProgressModel::new();
    model.insert(ItemState::queued("a")).unwrap();
    model.update(at("a", Phase::Downloading, 50, 100, 1)).unwrap();

    let backwards = [
        at("a", Phase::Connecting, 0, 0, 1),
        at("a", Phase::Downloading, 40, 100, 1),
        at("a", Phase::Downloading, 60, 100, 2),
        at("a", Phase::Downloading, 150, 100, 1),
    ];
    for state in backwards {
        assert!(matches!(
            model.update(state),
            Err(Error::InvalidTransition { .. })
        ));
    }
    assert_eq!(model.get("a").unwrap().bytes_received, 50);
}

#[test]
fn test_model_terminal_is_final() {
    let mut model = ProgressModel::new();
    model.insert(ItemState::queued("a")).unwrap();
    model.update(at("a", Phase::Cancelled, 0, 0, 1)).unwrap();

    assert!(model.update(at("a", Phase::Connecting, 0, 0, 1)).is_err());
    // Only a failure can be retried.
    assert!(model.update(at("a", Phase::Queued, 0, 0, 2)).is_err());
    // A new submission starts over.
    model.insert(ItemState::queued("a")).unwrap();
    assert_eq!(model.len(), 1);
    assert!(model.is_live("a"));
}

#[test]
fn test_model_duplicate_live_id() {
    let mut model = ProgressModel::new();
    model.insert(ItemState::queued("a")).unwrap();
    assert!(matches!(
        model.insert(ItemState::queued("a")),
        Err(Error::DuplicateItem(id)) if id == "a"
    ));
}

// === Throttle ===

#[test]
fn test_throttle_time_or_bytes() {
    let start = Instant::now();
    let mut throttle = ProgressThrottle::new(Duration::from_millis(50), 1000);

    assert!(throttle.should_emit(start, 0));
    assert!(!throttle.should_emit(start + Duration::from_millis(10), 500));
    assert!(throttle.should_emit(start + Duration::from_millis(20), 1000));
    assert!(!throttle.should_emit(start + Duration::from_millis(30), 1200));
    assert!(throttle.should_emit(start + Duration::from_millis(70), 1300));
}

// === Bar Styles ===

#[test]
fn test_style_options_default() {
    let style = StyleOptions::default();
    assert!(style.is_enabled());
    assert_eq!(style.main().to_progress_bar(6).length(), Some(6));
}

#[test]
fn test_style_options_hidden() {
    let style = StyleOptions::hidden();
    assert!(!style.is_enabled());
    assert!(style.child().to_progress_bar(10).is_hidden());
}

#[test]
fn test_progress_bar_opts_custom_template() {
    let opts = ProgressBarOpts::new(
        Some("{msg} {bar:20} {pos}/{len}".to_string()),
        Some(ProgressBarOpts::CHARS_LINE.to_string()),
        true,
        false,
    );
    let pb = opts.to_progress_bar(100);
    assert_eq!(pb.length(), Some(100));
}

#[test]
fn test_progress_bar_opts_invalid_template_falls_back() {
    let opts = ProgressBarOpts::new(Some("{bar:nope:nope".to_string()), None, true, true);
    let pb = opts.to_progress_bar(5);
    assert_eq!(pb.length(), Some(5));
}

// === Display ===

#[test]
fn test_display_tracks_items() {
    let mut display = ProgressDisplay::new(StyleOptions::hidden(), 2);

    display.handle(&HostEvent::ItemChanged(ItemState::queued("a")));
    display.handle(&HostEvent::ItemChanged(ItemState::queued("b")));
    display.handle(&HostEvent::ItemChanged(at("a", Phase::Downloading, 10, 20, 1)));
    assert_eq!(display.live_bars(), 2);

    display.handle(&HostEvent::PayloadReady {
        id: "a".into(),
        payload: Bytes::from_static(b"0123456789"),
    });
    display.handle(&HostEvent::ItemChanged(at("a", Phase::Done, 20, 20, 1)));
    display.handle(&HostEvent::ItemChanged(ItemState {
        last_error_kind: Some(ErrorKind::ContentNotFound),
        ..at("b", Phase::Failed, 0, 0, 1)
    }));
    assert_eq!(display.finished_items(), 2);
    assert_eq!(display.live_bars(), 0);
    display.finish();
}

#[test]
fn test_display_renders_notices() {
    let mut display = ProgressDisplay::new(StyleOptions::hidden(), 0);
    display.add_items(1);
    display.notice(&ToastNotice::Show(Toast::with_button(
        ToastId(1),
        "The connection has failed",
        "Retry 1 of 3",
    )));
    display.notice(&ToastNotice::Dismiss(ToastId(1)));
    display.handle(&HostEvent::ExitRequested);
    assert_eq!(display.finished_items(), 0);
    display.finish();
}
