//! Reads the sample config once and prints it
//!
//! Run with: cargo run --example console

mod common;

use common::{Sample, TextView, init_tracing, sdk_key};
use configcat::{ConfigCatClient, PollingMode, User};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let client = ConfigCatClient::builder()
        .mode(PollingMode::auto_poll(5)?)
        .build(&sdk_key())?;

    let user = User::builder()
        .email("configcat@example.com")
        .country("Hungary")
        .build("#SOME-USER-ID#");

    let mut view = TextView::default();

    let sample = client
        .get_configuration(Some(&user), Sample::default())
        .await;
    view.set_text(sample.to_string());

    let text = client
        .get_value("keySampleText", Some(&user), String::new())
        .await;
    view.set_text(format!("keySampleText: {}", text));

    client.close();
    Ok(())
}
