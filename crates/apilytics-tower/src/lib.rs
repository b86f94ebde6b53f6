// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! [`tower`] middleware reporting every request to Apilytics.
//!
//! Works with any service speaking `http::Request`/`http::Response`, which
//! covers hyper, axum and tonic.
//!
//! ```rust,ignore
//! let layer = ApilyticsLayer::from_env()?.with_integrated_library("axum/0.7.5");
//! let app = Router::new().route("/", get(handler)).layer(layer);
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use apilytics::{Collector, Config, Error, RequestInfo};
use hyper::body::Body;
use hyper::header::{HeaderMap, CONTENT_LENGTH, USER_AGENT};
use hyper::{Request, Response};
use tower::{Layer, Service};
use tracing::debug;

pub const INTEGRATION_NAME: &str = "apilytics-rust-tower";

const FORWARDED_FOR: &str = "x-forwarded-for";

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Wraps services in [`ApilyticsService`].
#[derive(Clone, Debug)]
pub struct ApilyticsLayer {
    collector: Option<Collector>,
    integrated_library: Option<Arc<str>>,
}

impl ApilyticsLayer {
    /// # Errors
    ///
    /// Fails when the config is invalid. A missing API key is not an error,
    /// it yields a disabled layer.
    pub fn new(config: Config) -> Result<Self, Error> {
        let collector = Collector::new(config)?;
        if collector.is_none() {
            debug!("Apilytics middleware disabled");
        }
        Ok(Self {
            collector,
            integrated_library: None,
        })
    }

    /// Builds the layer from `APILYTICS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Fails when the environment holds an invalid config.
    pub fn from_env() -> Result<Self, Error> {
        Self::new(Config::from_env()?)
    }

    /// Sets the framework name and version reported with every event,
    /// e.g. `axum/0.7.5`.
    #[must_use]
    pub fn with_integrated_library(mut self, integrated_library: impl Into<String>) -> Self {
        self.integrated_library = Some(Arc::from(integrated_library.into()));
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.collector.is_some()
    }
}

impl<S> Layer<S> for ApilyticsLayer {
    type Service = ApilyticsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApilyticsService {
            inner,
            collector: self.collector.clone(),
            integrated_library: self.integrated_library.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ApilyticsService<S> {
    inner: S,
    collector: Option<Collector>,
    integrated_library: Option<Arc<str>>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ApilyticsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: 'static,
    ReqBody: Body,
    ResBody: Body + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let Some(collector) = &self.collector else {
            return Box::pin(self.inner.call(request));
        };

        let info = request_info(&request, self.integrated_library.as_deref());
        let mut session = collector.session(info).begin();
        let response = self.inner.call(request);

        Box::pin(async move {
            let result = response.await;
            if let Ok(response) = &result {
                let size = body_size(response.headers(), response.body());
                session.update_response_info(Some(response.status().as_u16()), size);
            }
            session.end();
            result
        })
    }
}

fn request_info<B: Body>(request: &Request<B>, integrated_library: Option<&str>) -> RequestInfo {
    let headers = request.headers();
    let mut info = RequestInfo::new(request.uri().path(), request.method().as_str())
        .with_integration(INTEGRATION_NAME);

    if let Some(query) = request.uri().query() {
        info = info.with_query(query);
    }
    if let Some(size) = body_size(headers, request.body()) {
        info = info.with_request_size(size);
    }
    if let Some(user_agent) = header_str(headers, USER_AGENT.as_str()) {
        info = info.with_user_agent(user_agent);
    }
    if let Some(ip) = forwarded_for(headers) {
        info = info.with_ip(ip);
    }
    if let Some(library) = integrated_library {
        info = info.with_integrated_library(library);
    }
    info
}

/// `Content-Length`, falling back to the body's exact size hint.
fn body_size<B: Body>(headers: &HeaderMap, body: &B) -> Option<u64> {
    header_str(headers, CONTENT_LENGTH.as_str())
        .and_then(|length| length.trim().parse().ok())
        .or_else(|| body.size_hint().exact())
}

/// First hop of `X-Forwarded-For`.
fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, FORWARDED_FOR)?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}
