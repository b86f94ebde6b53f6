// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The attributes reported for one request/response cycle.

use std::time::Instant;

use serde_json::{Map, Value};

use crate::proc::SystemMetrics;

/// Everything known about one request when it is reported.
///
/// Request attributes are set when the session is created, response
/// attributes by the late [`update_response_info`] call, and the system
/// metrics only inside the background task right before sending.
///
/// [`update_response_info`]: crate::ActiveSession::update_response_info
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventRecord {
    pub path: String,
    pub method: String,
    pub query: Option<String>,
    pub user_agent: Option<String>,
    /// Used for geolocation only; never stored past this event.
    pub ip: Option<String>,
    pub request_size: Option<u64>,
    pub response_size: Option<u64>,
    pub status_code: Option<u16>,
    pub time_millis: u64,
    pub system: SystemMetrics,
}

impl EventRecord {
    /// Builds the JSON body sent to the ingestion endpoint.
    ///
    /// `path`, `method` and `timeMillis` are always present. Strings are only
    /// included when non-empty, numbers whenever they are known, zero
    /// included.
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("path".to_string(), Value::from(self.path.as_str()));
        payload.insert("method".to_string(), Value::from(self.method.as_str()));
        payload.insert("timeMillis".to_string(), Value::from(self.time_millis));

        insert_non_empty(&mut payload, "query", self.query.as_deref());
        insert_non_empty(&mut payload, "userAgent", self.user_agent.as_deref());
        insert_non_empty(&mut payload, "ip", self.ip.as_deref());

        insert_known(&mut payload, "statusCode", self.status_code);
        insert_known(&mut payload, "requestSize", self.request_size);
        insert_known(&mut payload, "responseSize", self.response_size);
        insert_known(&mut payload, "cpuUsage", self.system.cpu_usage);
        insert_known(&mut payload, "memoryUsage", self.system.memory_usage);
        insert_known(&mut payload, "memoryTotal", self.system.memory_total);

        Value::Object(payload)
    }
}

fn insert_non_empty(payload: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|value| !value.is_empty()) {
        payload.insert(key.to_string(), Value::from(value));
    }
}

fn insert_known<T: Into<Value>>(payload: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        payload.insert(key.to_string(), value.into());
    }
}

/// Whole milliseconds between two instants, truncated.
///
/// An `end` before `start` counts as zero.
pub fn elapsed_millis(start: Instant, end: Instant) -> u64 {
    u64::try_from(end.saturating_duration_since(start).as_millis()).unwrap_or(u64::MAX)
}
