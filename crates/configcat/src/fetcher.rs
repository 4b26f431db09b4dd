//! # Config Fetcher
//!
//! Downloads `config_v5.json` from the ConfigCat CDN.
//!
//! ## Features
//!
//! * Conditional requests with `If-None-Match`, a `304` is reported as [`FetchResponse::NotModified`]
//! * Data governance aware: follows the redirect instructions embedded in the config
//! * Never fails: transport and status errors become [`FetchResponse::Failed`]

use crate::error::{ConfigCatError, Result};
use crate::model::{Config, Entry, RedirectMode};
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument, warn};

pub(crate) const CONFIG_JSON_NAME: &str = "config_v5.json";
const GLOBAL_CDN_URL: &str = "https://cdn-global.configcat.com";
const EU_CDN_URL: &str = "https://cdn-eu.configcat.com";
const USER_AGENT_HEADER: &str = "X-ConfigCat-UserAgent";
const MAX_REDIRECTS: usize = 2;

/// Where the config JSON is downloaded from by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataGovernance {
    #[default]
    Global,
    EuOnly,
}

impl DataGovernance {
    pub fn cdn_url(&self) -> &'static str {
        match self {
            DataGovernance::Global => GLOBAL_CDN_URL,
            DataGovernance::EuOnly => EU_CDN_URL,
        }
    }
}

impl<'a> From<&'a str> for DataGovernance {
    fn from(s: &'a str) -> Self {
        match s.to_lowercase().as_str() {
            "eu" | "eu_only" | "euonly" => DataGovernance::EuOnly,
            _ => DataGovernance::Global,
        }
    }
}

impl fmt::Display for DataGovernance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataGovernance::Global => write!(f, "global"),
            DataGovernance::EuOnly => write!(f, "eu"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchResponse {
    Fetched(Entry),
    NotModified,
    Failed { error: String },
}

impl FetchResponse {
    fn failed(error: impl Into<String>) -> Self {
        FetchResponse::Failed {
            error: error.into(),
        }
    }
}

#[derive(Debug)]
struct FetcherState {
    base_url: String,
    etag: Option<String>,
}

#[derive(Debug)]
pub struct ConfigFetcher {
    client: Client,
    sdk_key: String,
    user_agent: String,
    url_is_custom: bool,
    state: Mutex<FetcherState>,
}

impl ConfigFetcher {
    /// `mode` identifies the polling mode in the user agent (`a`, `l` or `m`).
    pub fn new(
        sdk_key: &str,
        base_url: Option<&str>,
        data_governance: DataGovernance,
        request_timeout: Duration,
        mode: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConfigCatError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let (base_url, url_is_custom) = match base_url.filter(|u| !u.is_empty()) {
            Some(url) => (url.trim_end_matches('/').to_string(), true),
            None => (data_governance.cdn_url().to_string(), false),
        };

        Ok(Self {
            client,
            sdk_key: sdk_key.to_string(),
            user_agent: format!("ConfigCat-Rust/{}-{}", mode, env!("CARGO_PKG_VERSION")),
            url_is_custom,
            state: Mutex::new(FetcherState {
                base_url,
                etag: None,
            }),
        })
    }

    /// Fetches the latest config, following at most two redirects.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> FetchResponse {
        let mut state = self.state.lock().await;
        let mut remaining = MAX_REDIRECTS;

        loop {
            let response = self.fetch_once(&mut state).await;
            let FetchResponse::Fetched(entry) = &response else {
                return response;
            };
            let Some(preferences) = &entry.config.preferences else {
                return response;
            };

            let new_url = preferences.base_url.trim_end_matches('/');
            if new_url.is_empty() || new_url == state.base_url {
                return response;
            }

            let redirect = preferences.redirect_mode();
            // custom URLs are only left on a forced redirect
            if self.url_is_custom && redirect != RedirectMode::Force {
                return response;
            }

            state.base_url = new_url.to_string();
            match redirect {
                RedirectMode::No => return response,
                RedirectMode::Should => warn!(
                    "Your data_governance parameter at ConfigCatClient initialization is not in sync \
                     with your preferences on the ConfigCat Dashboard: \
                     https://app.configcat.com/organization/data-governance. \
                     Only Organization Admins can access this preference."
                ),
                RedirectMode::Force => {}
            }

            if remaining == 0 {
                error!(
                    "Redirection loop encountered while trying to fetch config JSON. Please contact us at https://configcat.com/support/"
                );
                return response;
            }
            remaining -= 1;
            state.etag = None;
            debug!(base_url = %state.base_url, "Following redirect");
        }
    }

    async fn fetch_once(&self, state: &mut FetcherState) -> FetchResponse {
        let url = format!(
            "{}/configuration-files/{}/{}",
            state.base_url, self.sdk_key, CONFIG_JSON_NAME
        );

        let mut request = self
            .client
            .get(&url)
            .header(USER_AGENT_HEADER, &self.user_agent);
        if let Some(etag) = &state.etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("Request timed out while trying to fetch config JSON: {}", e)
                } else {
                    format!("Unexpected error occurred while trying to fetch config JSON: {}", e)
                };
                error!(error = %e, "{}", message);
                return FetchResponse::failed(message);
            }
        };

        debug!(status = response.status().as_u16(), "Received response");

        match response.status() {
            StatusCode::NOT_MODIFIED => {
                debug!("Fetch was successful: config not modified");
                FetchResponse::NotModified
            }
            status if status.is_success() => {
                let etag = response
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        error!(error = %e, "Failed to read response body");
                        return FetchResponse::failed(e.to_string());
                    }
                };

                match serde_json::from_str::<Config>(&body) {
                    Ok(config) => {
                        debug!("Fetch was successful: new config fetched");
                        state.etag = etag.clone();
                        FetchResponse::Fetched(Entry::new(config, body, etag))
                    }
                    Err(e) => {
                        error!(error = %e, "Fetching config JSON was successful but the HTTP response content was invalid");
                        FetchResponse::failed(format!("Invalid config JSON content: {}", e))
                    }
                }
            }
            status @ (StatusCode::FORBIDDEN | StatusCode::NOT_FOUND) => {
                let message = format!(
                    "Your SDK Key seems to be wrong. You can find the valid SDK Key at https://app.configcat.com/sdkkey. Received unexpected response: {}",
                    status
                );
                error!("{}", message);
                FetchResponse::failed(message)
            }
            status => {
                let message = format!(
                    "Unexpected HTTP response was received while trying to fetch config JSON: {}",
                    status
                );
                error!("{}", message);
                FetchResponse::failed(message)
            }
        }
    }
}
