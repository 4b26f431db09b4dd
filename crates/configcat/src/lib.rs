//! ConfigCat client for Rust
//!
//! Downloads feature flags and settings from the ConfigCat CDN and evaluates
//! them locally, targeting rules and percentage rollouts included.
//!
//! # Overview
//!
//! * [`ConfigCatClient`] - evaluates flags, built with [`ClientBuilder`]
//! * [`PollingMode`] - auto polling, lazy loading or manual polling
//! * [`ConfigurationParser`] - typed access to a raw config payload, handed to
//!   [`ConfigurationChangeListener`]s
//! * [`User`] - the subject of targeting rules
//! * [`OverrideDataSource`] - local flag values from a map or a file
//!
//! # Installation
//!
//! Add the dependency in your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! configcat = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use configcat::{AutoPollingBuilder, ConfigCatClient, ConfigurationParser, User};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mode = AutoPollingBuilder::new()
//!         .auto_poll_interval_in_seconds(5)
//!         .configuration_change_listener(|parser: &ConfigurationParser, config: &str| {
//!             let value: bool = parser
//!                 .parse_value(config, "isAwesomeFeatureEnabled", None)
//!                 .unwrap_or(false);
//!             println!("isAwesomeFeatureEnabled: {}", value);
//!         })
//!         .build()
//!         .unwrap();
//!
//!     let client = ConfigCatClient::builder()
//!         .mode(mode)
//!         .build("PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ")
//!         .unwrap();
//!
//!     let user = User::builder().email("john@example.com").build("#SOME-USER-ID#");
//!     let enabled = client
//!         .get_value("isPOCFeatureEnabled", Some(&user), false)
//!         .await;
//!     println!("isPOCFeatureEnabled: {}", enabled);
//! }
//! ```

pub mod cache;
mod client;
mod details;
pub mod error;
mod evaluator;
mod fetcher;
mod hooks;
pub mod model;
mod overrides;
mod parser;
pub mod polling;
mod user;

pub use cache::{ConfigCache, InMemoryConfigCache, NullConfigCache};
pub use client::{ClientBuilder, ClientOptions, ConfigCatClient};
pub use details::{EvaluationDetails, EvaluationFailure, FailureKind};
pub use error::{ConfigCatError, Result};
pub use evaluator::{EvaluationResult, RolloutEvaluator};
pub use fetcher::DataGovernance;
pub use hooks::{ClientReadyState, Hooks};
pub use model::{SettingValue, Value};
pub use overrides::{FlagOverrides, OverrideBehaviour, OverrideDataSource};
pub use parser::ConfigurationParser;
pub use polling::{AutoPollingBuilder, ConfigurationChangeListener, PollingMode, RefreshResult};
pub use user::{User, UserBuilder};
