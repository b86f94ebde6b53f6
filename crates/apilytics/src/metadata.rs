// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The `Apilytics-Version` header identifying who produced an event.
//!
//! ```text
//! apilytics-rust-tower/0.1.0;rust/1.80.0;axum/0.7.5;linux
//! apilytics-rust-core/0.1.0;rust/1.80.0;;linux
//! ```
//!
//! Segments are positional: an unknown integrated library leaves its segment
//! empty so the platform is always the fourth one.

pub const DEFAULT_INTEGRATION: &str = "apilytics-rust-core";
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const RUSTC_VERSION: &str = env!("APILYTICS_RUSTC_VERSION");

/// Builds the integration metadata string.
///
/// * `integration` - Name of the calling integration, e.g. `apilytics-rust-tower`.
///   Defaults to [`DEFAULT_INTEGRATION`].
/// * `integrated_library` - Name and version of the framework, e.g. `axum/0.7.5`.
pub fn integration_metadata(integration: Option<&str>, integrated_library: Option<&str>) -> String {
    let integration = integration
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_INTEGRATION);
    let integrated_library = integrated_library.unwrap_or_default();
    let platform = std::env::consts::OS;

    format!("{integration}/{CORE_VERSION};rust/{RUSTC_VERSION};{integrated_library};{platform}")
}
