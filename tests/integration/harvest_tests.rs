use keyspace_harvester::config::{parse_config, Config};
use keyspace_harvester::crawler::{run_harvest, RunOptions};
use keyspace_harvester::storage::Snapshot;
use keyspace_harvester::Phase;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes one credential file per (file name, token) pair
fn write_credentials(dir: &Path, keys: &[(&str, &str)]) {
    fs::create_dir_all(dir).expect("Failed to create credentials directory");
    for (file, token) in keys {
        fs::write(
            dir.join(file),
            format!("DADATA_API_KEY={}\nDADATA_SECRET_KEY=secret-{}\n", token, token),
        )
        .expect("Failed to write credential file");
    }
}

/// Creates a test configuration for a small two-symbol key space
fn create_test_config(base_url: &str, workdir: &Path, budget: u64) -> Config {
    let toml = format!(
        r#"
[gateway]
base-url = "{base_url}"
endpoint-path = "suggest/court"
timeout-ms = 2000
max-retries = 1
retry-base-delay-ms = 5
requests-per-second = 100

[credentials]
directory = '{credentials}'
budget = {budget}

[crawler]
alphabet = "AB"
max-depth = 1
query-delay-ms = 0
checkpoint-interval = 2
miss-threshold = 2
tail-span = 10
phases = ["prefix", "tail", "gap"]

[output]
snapshot-path = '{snapshot}'
"#,
        base_url = base_url,
        credentials = workdir.join("keys").display(),
        budget = budget,
        snapshot = workdir.join("out").join("snapshot.json").display(),
    );
    parse_config(&toml).expect("Test config should be valid")
}

fn suggestions(codes: &[&str]) -> serde_json::Value {
    let suggestions: Vec<_> = codes
        .iter()
        .map(|code| json!({"value": code, "data": {"code": code, "name": format!("Court {}", code)}}))
        .collect();
    json!({ "suggestions": suggestions })
}

/// Mounts the endpoint for a key space holding 59RS0001, 59RS0003 and 59RS0004
///
/// Prefix "A" finds the first and third, the tail probe finds the fourth, and
/// "B" only returns a suggestion without a key.
async fn mount_key_space(server: &MockServer) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"query": "A"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(suggestions(&["59RS0001", "59RS0003"])),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"query": "B"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "suggestions": [{"value": "Archive", "data": {"code": null}}]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"query": "59RS0004", "count": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(suggestions(&["59RS0004"])))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(suggestions(&[])))
        .mount(server)
        .await;
}

fn read_snapshot(config: &Config) -> Snapshot {
    let content =
        fs::read_to_string(&config.output.snapshot_path).expect("Snapshot should be written");
    serde_json::from_str(&content).expect("Snapshot should be valid JSON")
}

#[tokio::test]
async fn test_full_harvest_discovers_key_space() {
    let mock_server = MockServer::start().await;
    mount_key_space(&mock_server).await;

    let workdir = TempDir::new().expect("Failed to create temp dir");
    write_credentials(&workdir.path().join("keys"), &[("2.env", "key-two")]);
    let config = create_test_config(&mock_server.uri(), workdir.path(), 100);

    let report = run_harvest(config.clone(), RunOptions::default())
        .await
        .expect("Harvest failed");

    // A, B, then tail 0004 (hit), 0005, 0006 (misses), then gap 0002
    assert_eq!(report.requests, 6);
    assert_eq!(report.initial_entities, 0);
    assert_eq!(report.final_entities, 3);
    assert_eq!(report.discovered, 3);
    assert_eq!(report.unkeyed, 1);
    assert_eq!(report.failures, 0);
    assert!(!report.exhausted);
    assert_eq!(
        report.completed_phases,
        vec![Phase::Prefix, Phase::Tail, Phase::Gap]
    );

    let snapshot = read_snapshot(&config);
    let keys: Vec<&str> = snapshot.entities.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["59RS0001", "59RS0003", "59RS0004"]);
    assert_eq!(snapshot.meta.entity_count, 3);
    assert_eq!(
        snapshot.entities[0].attribute("name"),
        Some(&json!("Court 59RS0001"))
    );
    assert!(snapshot.queries.contains_key("59RS0002"));
}

#[tokio::test]
async fn test_second_run_resumes_without_requests() {
    let mock_server = MockServer::start().await;
    mount_key_space(&mock_server).await;

    let workdir = TempDir::new().expect("Failed to create temp dir");
    write_credentials(&workdir.path().join("keys"), &[("2.env", "key-two")]);
    let config = create_test_config(&mock_server.uri(), workdir.path(), 100);

    run_harvest(config.clone(), RunOptions::default())
        .await
        .expect("First harvest failed");

    let report = run_harvest(config.clone(), RunOptions::default())
        .await
        .expect("Second harvest failed");

    assert_eq!(report.requests, 0);
    assert_eq!(report.initial_entities, 3);
    assert_eq!(report.final_entities, 3);
    assert_eq!(report.discovered, 0);
}

#[tokio::test]
async fn test_fresh_run_ignores_corrupt_snapshot() {
    let mock_server = MockServer::start().await;
    mount_key_space(&mock_server).await;

    let workdir = TempDir::new().expect("Failed to create temp dir");
    write_credentials(&workdir.path().join("keys"), &[("2.env", "key-two")]);
    let config = create_test_config(&mock_server.uri(), workdir.path(), 100);

    let snapshot_path = &config.output.snapshot_path;
    fs::create_dir_all(snapshot_path.parent().expect("Snapshot path has a parent"))
        .expect("Failed to create output directory");
    fs::write(snapshot_path, "{ not json").expect("Failed to write corrupt snapshot");

    let resumed = run_harvest(config.clone(), RunOptions::default()).await;
    assert!(resumed.is_err(), "Corrupt snapshot should stop a resumed run");

    let report = run_harvest(
        config.clone(),
        RunOptions {
            fresh: true,
            config_hash: None,
        },
    )
    .await
    .expect("Fresh harvest failed");

    assert_eq!(report.final_entities, 3);
    assert_eq!(read_snapshot(&config).entities.len(), 3);
}

#[tokio::test]
async fn test_quota_rejection_rotates_to_next_credential() {
    let mock_server = MockServer::start().await;

    // The first credential is already spent upstream
    Mock::given(method("POST"))
        .and(header("authorization", "Token key-two"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_key_space(&mock_server).await;

    let workdir = TempDir::new().expect("Failed to create temp dir");
    write_credentials(
        &workdir.path().join("keys"),
        &[
            ("1.env", "key-one"),
            ("2.env", "key-two"),
            ("3.env", "key-three"),
        ],
    );
    let config = create_test_config(&mock_server.uri(), workdir.path(), 100);

    let report = run_harvest(config.clone(), RunOptions::default())
        .await
        .expect("Harvest failed");

    assert_eq!(report.quota_errors, 1);
    assert_eq!(report.rotations, 1);
    assert_eq!(report.final_entities, 3);
    assert!(!report.exhausted);
}

#[tokio::test]
async fn test_exhausted_budget_stops_with_snapshot() {
    let mock_server = MockServer::start().await;
    mount_key_space(&mock_server).await;

    let workdir = TempDir::new().expect("Failed to create temp dir");
    write_credentials(&workdir.path().join("keys"), &[("2.env", "key-two")]);
    let config = create_test_config(&mock_server.uri(), workdir.path(), 3);

    let report = run_harvest(config.clone(), RunOptions::default())
        .await
        .expect("Exhaustion is not an error");

    assert!(report.exhausted);
    assert_eq!(report.requests, 3);
    assert_eq!(report.completed_phases, vec![Phase::Prefix]);
    assert_eq!(report.unverified_prefixes, vec!["59RS".to_string()]);

    let snapshot = read_snapshot(&config);
    assert_eq!(snapshot.entities.len(), 3);
    assert_eq!(snapshot.meta.completed_phases, vec![Phase::Prefix]);
}
