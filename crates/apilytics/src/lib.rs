// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request/response telemetry for HTTP server middleware.
//!
//! A framework adapter builds a [`Collector`] once at setup time and opens a
//! [`MeasurementSession`] for every inbound request. When the session ends the
//! event is handed to a single process-wide background worker which samples
//! host CPU and memory usage, serializes the event and posts it to the
//! Apilytics ingestion endpoint. Nothing on that path can fail the request
//! being served: sampling errors drop fields and transport errors are
//! swallowed.
//!
//! ```rust,ignore
//! use apilytics::{Collector, Config, RequestInfo};
//!
//! let Some(collector) = Collector::new(Config::from_env()?)? else {
//!     // No API key: run without telemetry.
//!     return Ok(());
//! };
//!
//! let response = collector
//!     .session(RequestInfo::new("/users/42", "GET").with_query("expand=1"))
//!     .measure(|session| {
//!         let response = handle(request)?;
//!         session.update_response_info(Some(response.status), Some(response.body.len() as u64));
//!         Ok(response)
//!     });
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod metadata;
pub mod proc;
pub mod session;
pub mod transport;

pub use collector::{Collector, RequestInfo};
pub use config::Config;
pub use error::Error;
pub use session::{ActiveSession, MeasurementSession};
