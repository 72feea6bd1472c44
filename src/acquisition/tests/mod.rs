//! Acquisition tests against a local mock HTTP server

pub mod fetcher_tests;

use crate::config::PipelineConfig;
use crate::test_support::{FixtureLine, zip_archive};
use chrono::NaiveDate;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub(crate) fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, day).unwrap()
}

/// Configuration pointing at the mock server with near-zero backoff
pub(crate) fn test_config(root: &Path, server: &MockServer) -> PipelineConfig {
    PipelineConfig::rooted_at(root)
        .with_base_url(server.uri())
        .with_backoff(1, 5)
        .with_timeout_seconds(5)
}

pub(crate) fn remote_path(day: u32) -> String {
    format!(
        "/2025/2/vehiculos/matriculaciones/export_mat_202502{:02}.zip",
        day
    )
}

/// Zip archive holding a one-line daily file
pub(crate) fn daily_archive(day: u32) -> Vec<u8> {
    let line = FixtureLine::new("TESLA", "MODEL 3", &format!("VIN{:014}", day), "BEV").render();
    zip_archive(
        &format!("export_mat_202502{:02}.txt", day),
        format!("{}\n", line).as_bytes(),
    )
}

pub(crate) async fn mount_archive(server: &MockServer, day: u32) {
    Mock::given(method("GET"))
        .and(path(remote_path(day)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(daily_archive(day)))
        .mount(server)
        .await;
}
