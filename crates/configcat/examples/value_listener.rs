//! Renders a single flag every time the config changes
//!
//! The change listener runs on the polling task and writes straight into
//! the view.
//!
//! Run with: cargo run --example value_listener
//!
//! Set `CONFIGCAT_SDK_KEY` to use your own project.

mod common;

use common::{TextView, init_tracing, sdk_key};
use configcat::{AutoPollingBuilder, ConfigCatClient, ConfigurationParser, User};
use std::sync::{Arc, Mutex};

const FLAG_KEY: &str = "bool30TrueAdvancedRules";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let view = Arc::new(Mutex::new(TextView::default()));
    let user = User::new("key");

    let listener_view = view.clone();
    let mode = AutoPollingBuilder::new()
        .auto_poll_interval_in_seconds(5)
        .configuration_change_listener(move |parser: &ConfigurationParser, config: &str| {
            let value: bool = parser
                .parse_value(config, FLAG_KEY, Some(&user))
                .unwrap_or(false);
            if let Ok(mut view) = listener_view.lock() {
                view.set_text(format!("{}: {}", FLAG_KEY, value));
            }
        })
        .build()?;

    let client = ConfigCatClient::builder().mode(mode).build(&sdk_key())?;

    println!("Polling every 5 seconds. Press Ctrl+C to stop.\n");
    tokio::signal::ctrl_c().await?;

    client.close();
    Ok(())
}
