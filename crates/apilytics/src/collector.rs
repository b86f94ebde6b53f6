// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::event::EventRecord;
use crate::metadata::integration_metadata;
use crate::proc::SystemSampler;
use crate::session::MeasurementSession;
use crate::transport::Transport;

/// Request attributes an adapter extracts when a request comes in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestInfo {
    /// e.g. "/foo/bar/123"
    pub path: String,
    /// e.g. "GET"
    pub method: String,
    /// e.g. "key=val&other=123". Empty and `None` are equivalent.
    pub query: Option<String>,
    /// Size of the request body in bytes
    pub request_size: Option<u64>,
    pub user_agent: Option<String>,
    /// Client IP, used for geolocation and never stored
    pub ip: Option<String>,
    /// Name of the calling integration, e.g. "apilytics-rust-tower"
    pub integration: Option<String>,
    /// Name and version of the framework, e.g. "axum/0.7.5"
    pub integrated_library: Option<String>,
}

impl RequestInfo {
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn with_request_size(mut self, request_size: u64) -> Self {
        self.request_size = Some(request_size);
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    #[must_use]
    pub fn with_integration(mut self, integration: impl Into<String>) -> Self {
        self.integration = Some(integration.into());
        self
    }

    #[must_use]
    pub fn with_integrated_library(mut self, integrated_library: impl Into<String>) -> Self {
        self.integrated_library = Some(integrated_library.into());
        self
    }
}

/// Entry point for framework adapters.
///
/// Created once at setup time and cloned into every request handler. Cloning
/// is cheap; all clones share one HTTP client.
#[derive(Clone, Debug)]
pub struct Collector {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    transport: Transport,
    sampler: SystemSampler,
    // `None` sends through the process-wide worker.
    dispatcher: Option<Dispatcher>,
}

impl Collector {
    /// Builds a collector, or returns `Ok(None)` when no API key is
    /// configured. Adapters check this once and skip measuring entirely in
    /// the `None` case.
    ///
    /// The rest of the config is only validated once a key is present.
    pub fn new(config: Config) -> Result<Option<Self>, Error> {
        let Some(api_key) = config.api_key.as_deref().filter(|_| config.is_enabled()) else {
            debug!("No Apilytics API key configured, telemetry disabled");
            return Ok(None);
        };

        config.validate()?;

        let transport = Transport::new(&config, api_key)?;
        let sampler = SystemSampler::from_config(&config);

        Ok(Some(Self {
            inner: Arc::new(Inner {
                transport,
                sampler,
                dispatcher: None,
            }),
        }))
    }

    /// Routes this collector's events through `dispatcher` instead of the
    /// process-wide worker.
    #[must_use]
    pub fn with_dispatcher(self, dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport: self.inner.transport.clone(),
                sampler: self.inner.sampler.clone(),
                dispatcher: Some(dispatcher),
            }),
        }
    }

    /// Creates the session for one request.
    pub fn session(&self, request: RequestInfo) -> MeasurementSession {
        let metadata = integration_metadata(
            request.integration.as_deref(),
            request.integrated_library.as_deref(),
        );
        let record = EventRecord {
            path: request.path,
            method: request.method,
            query: request.query,
            user_agent: request.user_agent,
            ip: request.ip,
            request_size: request.request_size,
            ..EventRecord::default()
        };

        MeasurementSession::new(self.clone(), record, metadata)
    }

    /// Hands a finished event to the background worker, which samples the
    /// host metrics and sends it.
    pub(crate) fn dispatch(&self, integration_metadata: String, mut record: EventRecord) {
        let inner = Arc::clone(&self.inner);
        let task = async move {
            record.system = inner.sampler.sample().await;
            inner.transport.send(&integration_metadata, &record).await;
        };

        match &self.inner.dispatcher {
            Some(dispatcher) => dispatcher.submit(task),
            None => Dispatcher::global().submit(task),
        }
    }
}
