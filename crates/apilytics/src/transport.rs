// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::config::Config;
use crate::error::Error;
use crate::event::EventRecord;

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const VERSION_HEADER: &str = "Apilytics-Version";

/// Posts events to the ingestion endpoint.
#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl Transport {
    pub fn new(config: &Config, api_key: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            client: build_client(config.https_proxy.as_deref(), config.timeout)?,
            endpoint: config.endpoint.clone(),
            api_key: api_key.into(),
        })
    }

    /// Sends one event. Best effort: every failure is logged at debug level
    /// and dropped, and the response is never looked at.
    pub async fn send(&self, integration_metadata: &str, event: &EventRecord) {
        let result = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .header(VERSION_HEADER, integration_metadata)
            .json(&event.to_payload())
            .send()
            .await;

        match result {
            Ok(_) => debug!("Sent event for {} {}", event.method, event.path),
            Err(e) => debug!("Failed to send event: {e}"),
        }
    }
}

/// Builds a reqwest client with optional proxy configuration and timeout.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Option<Duration>,
) -> Result<reqwest::Client, Error> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    Ok(builder.build()?)
}
