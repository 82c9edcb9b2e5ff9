//! Example downloading images into memory with a progress display.
//!
//! ```text
//! cargo run --example images -- https://example.com/a.png https://example.com/b.png
//! ```
//!
//! Prompts are accepted automatically.

use color_eyre::Result;
use ferry::orchestrator::EngineBuilder;
use ferry::progress::{ProgressDisplay, StyleOptions};
use ferry::toast::{ChannelToastBus, ToastNotice, ToastResult};
use ferry::{Batch, Phase};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let urls: Vec<String> = std::env::args().skip(1).collect();
    let batch = Batch::from_urls(urls.iter().map(String::as_str))?;

    let (toasts, mut notices) = ChannelToastBus::new();
    let engine = EngineBuilder::new()
        .max_concurrent(3)
        .toast_bus(toasts.clone())
        .spawn()?;

    let (_, mut events) = engine.subscribe().await?;
    let mut display = ProgressDisplay::new(StyleOptions::default(), batch.len());
    let download = engine.download(batch);
    tokio::pin!(download);

    let states = loop {
        tokio::select! {
            states = &mut download => break states?,
            Some(notice) = notices.recv() => {
                display.notice(&notice);
                if let ToastNotice::Show(toast) = notice {
                    toasts.respond(toast.id, ToastResult::ButtonSelected);
                }
            }
            event = events.recv() => match event {
                Ok(event) => display.handle(&event),
                // Missed updates only affect the bars.
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break (&mut download).await?,
            },
        }
    };
    display.finish();

    let done: Vec<_> = states.iter().filter(|s| s.phase == Phase::Done).collect();
    let received: u64 = done.iter().map(|s| s.bytes_received).sum();
    println!(
        "\nDownload complete! {} of {} images, {} bytes.",
        done.len(),
        states.len(),
        received
    );

    engine.shutdown().await?;
    Ok(())
}
