// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::Error;
use crate::proc::constants::{CPU_SAMPLE_WINDOW, PROC_MEMINFO_PATH, PROC_STAT_PATH};
use reqwest::Url;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://www.apilytics.io/api/v1/middleware";

/// Configuration for a [`Collector`](crate::Collector).
#[derive(Debug, Clone)]
pub struct Config {
    /// Apilytics origin API key. `None` disables the integration entirely.
    pub api_key: Option<String>,
    /// Ingestion endpoint the events are posted to
    pub endpoint: String,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Request timeout for the ingestion call. `None` keeps the HTTP client default.
    pub timeout: Option<Duration>,
    /// Length of the window CPU usage is measured over
    pub cpu_sample_window: Duration,
    pub proc_stat_path: PathBuf,
    pub proc_meminfo_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            https_proxy: None,
            timeout: None,
            cpu_sample_window: CPU_SAMPLE_WINDOW,
            proc_stat_path: PathBuf::from(PROC_STAT_PATH),
            proc_meminfo_path: PathBuf::from(PROC_MEMINFO_PATH),
        }
    }
}

impl Config {
    /// Config with the given API key and defaults for everything else.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: normalize_api_key(Some(api_key.into())),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Without `APILYTICS_API_KEY` the other variables are not read, so they
    /// can't fail a disabled setup.
    pub fn from_env() -> Result<Self, Error> {
        let Some(api_key) = normalize_api_key(env::var("APILYTICS_API_KEY").ok()) else {
            return Ok(Self::default());
        };
        // APILYTICS_URL will primarily be used for integration tests
        let endpoint = env::var("APILYTICS_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let https_proxy = env::var("APILYTICS_PROXY_HTTPS")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();
        let timeout = match env::var("APILYTICS_TIMEOUT_MS") {
            Ok(val) => Some(Duration::from_millis(val.trim().parse::<u64>().map_err(
                |e| Error::InvalidConfig(format!("APILYTICS_TIMEOUT_MS={val}: {e}")),
            )?)),
            Err(_) => None,
        };

        let config = Self {
            api_key: Some(api_key),
            endpoint,
            https_proxy,
            timeout,
            ..Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Error> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| Error::InvalidConfig(format!("endpoint {}: {e}", self.endpoint)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "endpoint {} must use http or https",
                self.endpoint
            )));
        }

        if self.timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether telemetry should be collected at all.
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }
}

fn normalize_api_key(api_key: Option<String>) -> Option<String> {
    api_key.filter(|key| !key.trim().is_empty())
}
