//! Hands config updates back to the main task
//!
//! The view is owned by `main`. The change listener runs on the polling
//! task, so it only formats the text and sends it over a channel; the main
//! task applies it.
//!
//! Run with: cargo run --example main_thread_dispatch

mod common;

use common::{Sample, TextView, init_tracing, sdk_key};
use configcat::{AutoPollingBuilder, ConfigCatClient, ConfigurationParser, User};
use tokio::sync::mpsc;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let (sender, mut updates) = mpsc::unbounded_channel::<String>();
    let user = User::new("key");

    let mode = AutoPollingBuilder::new()
        .auto_poll_interval_in_seconds(5)
        .configuration_change_listener(move |parser: &ConfigurationParser, config: &str| {
            let text = match parser.parse::<Sample>(config, Some(&user)) {
                Ok(sample) => sample.to_string(),
                Err(e) => {
                    warn!("Could not read the sample config: {}", e);
                    return;
                }
            };
            if sender.send(text).is_err() {
                warn!("View is gone, dropping the update");
            }
        })
        .build()?;

    let client = ConfigCatClient::builder().mode(mode).build(&sdk_key())?;

    let mut view = TextView::default();
    println!("Polling every 5 seconds. Press Ctrl+C to stop.\n");
    loop {
        tokio::select! {
            Some(text) = updates.recv() => view.set_text(text),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.close();
    Ok(())
}
