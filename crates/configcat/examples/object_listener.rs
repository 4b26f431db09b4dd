//! Renders the whole sample config as a typed object
//!
//! The listener deserializes every setting into [`Sample`] and updates the
//! view from the polling task, without handing the update to another task.
//!
//! Run with: cargo run --example object_listener

mod common;

use common::{Sample, TextView, init_tracing, sdk_key};
use configcat::{AutoPollingBuilder, ConfigCatClient, ConfigurationParser};
use std::sync::{Arc, Mutex};
use tracing::warn;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let view = Arc::new(Mutex::new(TextView::default()));

    let listener_view = view.clone();
    let mode = AutoPollingBuilder::new()
        .auto_poll_interval_in_seconds(5)
        .configuration_change_listener(move |parser: &ConfigurationParser, config: &str| {
            match parser.parse::<Sample>(config, None) {
                Ok(sample) => {
                    if let Ok(mut view) = listener_view.lock() {
                        view.set_text(sample.to_string());
                    }
                }
                Err(e) => warn!("Could not read the sample config: {}", e),
            }
        })
        .build()?;

    let client = ConfigCatClient::builder().mode(mode).build(&sdk_key())?;

    println!("Polling every 5 seconds. Press Ctrl+C to stop.\n");
    tokio::signal::ctrl_c().await?;

    client.close();
    Ok(())
}
