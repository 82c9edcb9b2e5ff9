//! Example fetching the image catalog and reading it back from disk.
//!
//! Prompts are printed above the progress bars and answered on stdin:
//! press enter to retry, type anything else to give up.

use color_eyre::Result;
use ferry::catalog::{CatalogSource, DEFAULT_CATALOG_PATH};
use ferry::orchestrator::{EngineBuilder, HostEvent};
use ferry::progress::{ProgressDisplay, StyleOptions};
use ferry::storage::FsArtifactWriter;
use ferry::toast::{ChannelToastBus, ToastNotice, ToastResult};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let (toasts, mut notices) = ChannelToastBus::new();
    let engine = EngineBuilder::new()
        .toast_bus(toasts.clone())
        .spawn()?;

    let (_, mut events) = engine.subscribe().await?;
    let catalog = CatalogSource::remote_default(DEFAULT_CATALOG_PATH)?;

    // Render events and answer prompts while the refresh runs.
    let ui = tokio::spawn(async move {
        let mut display = ProgressDisplay::new(StyleOptions::default(), 1);
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                Ok(event) = events.recv() => {
                    display.handle(&event);
                    if let HostEvent::ExitRequested = event {
                        break;
                    }
                }
                Some(notice) = notices.recv() => {
                    display.notice(&notice);
                    if let ToastNotice::Show(toast) = notice {
                        let answer = match (toast.button.is_some(), stdin.next_line().await) {
                            (true, Ok(Some(line))) if line.trim().is_empty() => ToastResult::ButtonSelected,
                            _ => ToastResult::Dismissed,
                        };
                        toasts.respond(toast.id, answer);
                    }
                }
                else => break,
            }
        }
        display.finish();
    });

    match catalog.refresh(&engine, &FsArtifactWriter::new()).await? {
        Some(xml) => println!(
            "\nCatalog saved to {} ({} bytes).",
            catalog.path().display(),
            xml.len()
        ),
        None => println!("\nCatalog could not be refreshed."),
    }

    engine.shutdown().await?;
    ui.abort();
    Ok(())
}
