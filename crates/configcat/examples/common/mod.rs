//! Common pieces shared by the sample screens

use serde::Deserialize;
use std::fmt;
use tracing_subscriber::EnvFilter;

/// SDK key of the public ConfigCat sample project.
pub const SAMPLE_SDK_KEY: &str = "PKDVCLf-Hq-h-kCzMp-L7Q/psuH7BGHoUmdONrzzUOY7A";

/// Reads `CONFIGCAT_SDK_KEY`, falling back to the sample project.
pub fn sdk_key() -> String {
    std::env::var("CONFIGCAT_SDK_KEY")
        .ok()
        .filter(|key| !key.is_empty())
        .unwrap_or_else(|| SAMPLE_SDK_KEY.to_string())
}

/// Installs a `RUST_LOG` driven subscriber, `info` by default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Receives the settings of the sample project.
#[allow(dead_code)]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Sample {
    #[serde(rename = "keyBool")]
    pub key_bool: bool,
    #[serde(rename = "keyInteger")]
    pub key_integer: i64,
    #[serde(rename = "keyDouble")]
    pub key_double: f64,
    #[serde(rename = "keyString")]
    pub key_string: String,
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sample {{ keyBool: {}, keyInteger: {}, keyDouble: {}, keyString: \"{}\" }}",
            self.key_bool, self.key_integer, self.key_double, self.key_string
        )
    }
}

/// Stand-in for a screen widget: remembers its text and prints every update.
#[derive(Debug, Default)]
pub struct TextView {
    text: String,
}

impl TextView {
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        println!("{}", self.text);
    }

    #[allow(dead_code)]
    pub fn text(&self) -> &str {
        &self.text
    }
}
