// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Common test utilities for integration tests

pub mod mock_server;

use apilytics::{Collector, Config};
use mock_server::{MockServer, ReceivedRequest};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{sleep, timeout};

pub const INGEST_PATH: &str = "/api/v1/middleware";

pub fn path_from_root(file: &str) -> PathBuf {
    let mut safe_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    safe_path.push(file);
    safe_path
}

/// Config pointing at the mock server, with a short CPU window so tests don't
/// wait a full second per event.
pub fn test_config(server: &MockServer) -> Config {
    Config {
        endpoint: format!("{}{INGEST_PATH}", server.url()),
        cpu_sample_window: Duration::from_millis(10),
        ..Config::with_api_key("dummy-key")
    }
}

pub fn collector(config: Config) -> Collector {
    Collector::new(config)
        .expect("valid config")
        .expect("API key is set")
}

/// Waits until the server has received `count` events, then a little longer
/// to catch any extra ones.
pub async fn wait_for_events(server: &MockServer, count: usize) -> Vec<ReceivedRequest> {
    let received = async {
        while server.get_requests_for_path(INGEST_PATH).len() < count {
            sleep(Duration::from_millis(10)).await;
        }
    };
    timeout(Duration::from_secs(10), received)
        .await
        .expect("timed out waiting for events");

    sleep(Duration::from_millis(100)).await;
    server.get_requests_for_path(INGEST_PATH)
}
