// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-request measurement.
//!
//! A [`MeasurementSession`] holds the request attributes until the request
//! starts being handled. [`MeasurementSession::begin`] starts the clock and
//! returns an [`ActiveSession`], which accepts the response attributes and
//! ends when it is dropped: on normal return, on early return, while
//! unwinding from a panic, or when an async handler's future is cancelled.
//! Ending hands the event to the background worker and returns immediately.

use std::time::Instant;

use crate::collector::Collector;
use crate::event::{elapsed_millis, EventRecord};

/// A request that has been described but not timed yet.
#[derive(Debug)]
#[must_use = "a session only reports once `begin` is called"]
pub struct MeasurementSession {
    collector: Collector,
    record: EventRecord,
    integration_metadata: String,
}

impl MeasurementSession {
    pub(crate) fn new(
        collector: Collector,
        record: EventRecord,
        integration_metadata: String,
    ) -> Self {
        Self {
            collector,
            record,
            integration_metadata,
        }
    }

    /// Value of the `Apilytics-Version` header this session will send.
    pub fn integration_metadata(&self) -> &str {
        &self.integration_metadata
    }

    /// Starts timing the request.
    pub fn begin(self) -> ActiveSession {
        ActiveSession {
            start: Instant::now(),
            pending: Some(Pending {
                collector: self.collector,
                record: self.record,
                integration_metadata: self.integration_metadata,
            }),
        }
    }

    /// Times `f` and reports the request once it returns or unwinds.
    ///
    /// Whatever `f` returns, errors included, is passed through unchanged.
    pub fn measure<R>(self, f: impl FnOnce(&mut ActiveSession) -> R) -> R {
        let mut session = self.begin();
        f(&mut session)
    }
}

/// A request being handled. Reports it when dropped.
#[derive(Debug)]
pub struct ActiveSession {
    start: Instant,
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    collector: Collector,
    record: EventRecord,
    integration_metadata: String,
}

impl ActiveSession {
    /// Records the response attributes, replacing any previous call.
    ///
    /// Not calling this leaves both unknown, e.g. when the handler failed.
    pub fn update_response_info(&mut self, status_code: Option<u16>, response_size: Option<u64>) {
        if let Some(pending) = self.pending.as_mut() {
            pending.record.status_code = status_code;
            pending.record.response_size = response_size;
        }
    }

    /// Stops the clock and submits the event for sending.
    ///
    /// Same as dropping the session.
    pub fn end(self) {
        drop(self);
    }

    fn close(&mut self, end: Instant) -> Option<Pending> {
        let mut pending = self.pending.take()?;
        pending.record.time_millis = elapsed_millis(self.start, end);
        Some(pending)
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        if let Some(pending) = self.close(Instant::now()) {
            pending
                .collector
                .dispatch(pending.integration_metadata, pending.record);
        }
    }
}
