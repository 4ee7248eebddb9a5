//! End-to-end tests for a collector run
//!
//! Both feeds and the GitHub contents API are served by wiremock; the local
//! dataset lives in a temporary directory.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use quake_common::record::records_from_json;
use quake_common::{Depth, Magnitude};
use quake_ingest::{IngestConfig, IngestError, Pipeline, PublishConfig, PublishOutcome};
use std::path::Path;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const CONTENTS_PATH: &str = "/repos/owner/quakes/contents/public/data/deprem_data.json";

fn kandilli_page(rows: &[&str]) -> String {
    format!(
        "<HTML><HEAD><TITLE>Son Depremler</TITLE></HEAD><BODY><pre>
RECENT EARTHQUAKES IN TURKEY
KOERI REGIONAL EARTHQUAKE-TSUNAMI MONITORING CENTER
(QUICK EPICENTER DETERMINATIONS)

Magnitude (MD Duration, ML Local, Mw Moment)
Date       Time      Latit(N)  Long(E)   Depth(km)     MD   ML   Mw    Region
---------- --------  --------  -------   ----------    ------------    -----------
{}
</pre></BODY></HTML>",
        rows.join("\n")
    )
}

fn default_kandilli_page() -> String {
    kandilli_page(&[
        "2024.01.01 10:00:00  38.0000   27.0000        7.0      -.-  2.1  -.-   AKHISAR (MANISA)    İlksel",
        "2024.01.01 08:30:00  36.5000   28.1000       12.4      -.-  -.-  -.-   AKDENIZ    İlksel",
    ])
}

fn afad_feed() -> serde_json::Value {
    // 2024-01-01T09:15:00Z and 2024-01-01T11:00:00Z
    serde_json::json!({
        "earthquakes": [
            {"timestamp": 1704100500, "latitude": 39.2, "longitude": 28.9,
             "depth": 9.1, "ml": 3.2, "location": "Simav (Kütahya)"},
            {"timestamp": 1704106800, "latitude": "37.1", "longitude": "29.3",
             "depth": null, "ml": null, "location": null}
        ]
    })
}

async fn mount_feeds(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/scripts/lst0.asp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(default_kandilli_page()))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/last-earthquakes.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(afad_feed()))
        .mount(server)
        .await;
}

fn config(server: &MockServer, output: &Path) -> IngestConfig {
    IngestConfig::builder()
        .kandilli_url(format!("{}/scripts/lst0.asp", server.uri()))
        .afad_url(format!("{}/last-earthquakes.json", server.uri()))
        .output_path(output)
        .timeout_secs(5)
        .max_retries(2)
        .retry_backoff_ms(1)
        .publish(PublishConfig {
            api_base_url: server.uri(),
            repository: "owner/quakes".to_string(),
            branch: "main".to_string(),
            remote_path: "public/data/deprem_data.json".to_string(),
            token: Some("test-token".to_string()),
        })
        .build()
}

#[tokio::test]
async fn test_dry_run_merges_both_feeds_newest_first() {
    let server = MockServer::start().await;
    mount_feeds(&server).await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("public/data/deprem_data.json");

    let report = Pipeline::from_config(config(&server, &output), true)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.records_written(), 4);
    assert_eq!(report.published, None);
    assert!(report.source_failures.is_empty());

    let records = records_from_json(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let times: Vec<_> = records.iter().map(|r| r.time.as_str()).collect();
    assert_eq!(times, vec!["11:00:00", "10:00:00", "09:15:00", "08:30:00"]);

    let afad_partial = &records[0];
    assert_eq!(afad_partial.source.as_deref(), Some("AFAD"));
    assert_eq!(afad_partial.magnitude, Magnitude::Unknown);
    assert_eq!(afad_partial.depth, Depth::Text(String::new()));
    assert_eq!(afad_partial.location, "");

    let kandilli = &records[1];
    assert_eq!(kandilli.source.as_deref(), Some("Kandilli"));
    assert_eq!(kandilli.date, "2024.01.01");
    assert_eq!(kandilli.solution, "İlksel");
}

#[tokio::test]
async fn test_repeated_runs_produce_identical_output() {
    let server = MockServer::start().await;
    mount_feeds(&server).await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("deprem_data.json");

    let pipeline = Pipeline::from_config(config(&server, &output), true).unwrap();

    pipeline.run().await.unwrap();
    let first = std::fs::read_to_string(&output).unwrap();

    let report = pipeline.run().await.unwrap();
    let second = std::fs::read_to_string(&output).unwrap();

    assert_eq!(first, second);
    assert_eq!(report.snapshot_records, 4);
    assert_eq!(report.stats.duplicates_removed, 4);
}

#[tokio::test]
async fn test_failed_feed_falls_back_to_other_source() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/scripts/lst0.asp"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/last-earthquakes.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(afad_feed()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("deprem_data.json");

    let report = Pipeline::from_config(config(&server, &output), true)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.records_written(), 2);
    assert_eq!(report.source_failures.len(), 1);
    assert_eq!(report.source_failures[0].kind, "fetch");
}

#[tokio::test]
async fn test_feed_without_listing_is_parse_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/scripts/lst0.asp"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>bakim</body></html>"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/last-earthquakes.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("deprem_data.json");

    let err = Pipeline::from_config(config(&server, &output), true)
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::NoSources(_)));
    assert_eq!(err.exit_code(), 3);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_publish_creates_remote_file() {
    let server = MockServer::start().await;
    mount_feeds(&server).await;

    Mock::given(method("GET"))
        .and(path(CONTENTS_PATH))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(CONTENTS_PATH))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("deprem_data.json");

    let report = Pipeline::from_config(config(&server, &output), false)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.published, Some(PublishOutcome::Created));

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&put.body).unwrap();

    assert!(payload.get("sha").is_none());
    assert_eq!(payload["branch"], "main");
    assert!(payload["message"].as_str().unwrap().starts_with("First upload "));

    let content = BASE64.decode(payload["content"].as_str().unwrap()).unwrap();
    assert_eq!(
        String::from_utf8(content).unwrap(),
        std::fs::read_to_string(&output).unwrap()
    );
}

#[tokio::test]
async fn test_publish_updates_with_current_sha() {
    let server = MockServer::start().await;
    mount_feeds(&server).await;

    Mock::given(method("GET"))
        .and(path(CONTENTS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"sha": "f00d"})),
        )
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(CONTENTS_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("deprem_data.json");

    let report = Pipeline::from_config(config(&server, &output), false)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.published, Some(PublishOutcome::Updated));

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&put.body).unwrap();

    assert_eq!(payload["sha"], "f00d");
    assert!(payload["message"].as_str().unwrap().starts_with("Auto update "));
}

#[tokio::test]
async fn test_rejected_token_fails_with_publish_exit_code() {
    let server = MockServer::start().await;
    mount_feeds(&server).await;

    Mock::given(method("GET"))
        .and(path(CONTENTS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("deprem_data.json");

    let err = Pipeline::from_config(config(&server, &output), false)
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "publish");
    assert_eq!(err.exit_code(), 5);
    // Local output is written before publishing
    assert!(output.exists());
}
