//! Command-line surface, run against the built binary.
//!
//! Run with: cargo test --test cli_test

mod common;

use std::fs;
use std::time::Duration;

use assert_cmd::Command;
use common::MockServer;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Binary isolated from the user's config directory and environment.
fn cef_client(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cef-client").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path())
        .env("HOME", home.path())
        .env_remove("CEF_CLIENT_CONFIG")
        .env_remove("CEF_CLIENT_URL")
        .env_remove("RUST_LOG")
        .timeout(Duration::from_secs(20));
    cmd
}

#[test]
fn help_lists_commands() {
    let home = TempDir::new().unwrap();
    cef_client(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("tabs")
                .and(predicate::str::contains("open"))
                .and(predicate::str::contains("screenshot"))
                .and(predicate::str::contains("watch")),
        );
}

#[test]
fn config_prints_built_in_defaults() {
    let home = TempDir::new().unwrap();
    cef_client(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("built-in defaults")
                .and(predicate::str::contains("ws://localhost:8080/browser")),
        );
}

#[test]
fn config_file_and_environment_are_layered() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("client.toml");
    fs::write(
        &path,
        "url = \"ws://10.0.0.5:9000/browser\"\nrequest_timeout_ms = 1234\n\n[replay]\nstreaming = false\n",
    )
    .unwrap();

    let output = cef_client(&home)
        .args(["--json", "config", "--config"])
        .arg(&path)
        .env("CEF_CLIENT_PING_INTERVAL_MS", "0")
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let config: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["url"], "ws://10.0.0.5:9000/browser");
    assert_eq!(config["request_timeout_ms"], 1234);
    assert_eq!(config["ping_interval_ms"], 0);
    assert_eq!(config["replay"], json!({ "size": true, "navigation": true, "streaming": false }));
}

#[test]
fn missing_explicit_config_file_fails() {
    let home = TempDir::new().unwrap();
    cef_client(&home)
        .args(["config", "--config"])
        .arg(home.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.toml"));
}

#[test]
fn non_websocket_url_is_rejected() {
    let home = TempDir::new().unwrap();
    cef_client(&home)
        .args(["--url", "http://localhost:8080/browser", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ws://"));
}

#[test]
fn json_errors_go_to_stdout() {
    let home = TempDir::new().unwrap();
    let output = cef_client(&home)
        .args(["--json", "--url", "ftp://nowhere", "tabs"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("ws://"));
}

#[tokio::test(flavor = "multi_thread")]
async fn tabs_against_live_server() {
    let server = MockServer::bind().await;
    let home = TempDir::new().unwrap();
    let mut cmd = cef_client(&home);
    cmd.args(["--json", "--url", &server.url(), "tabs"]);
    let run = tokio::task::spawn_blocking(move || cmd.output().unwrap());

    let mut peer = server.accept().await;
    assert_eq!(peer.path, "/browser");
    let request = peer.recv_request().await;
    assert_eq!(request["method"], "getTabs");
    assert_eq!(request["tab_id"], -1);
    peer.reply(&request, json!({ "tabs": [3, 5] })).await;
    peer.expect_close().await;

    let output = run.await.unwrap();
    assert!(output.status.success(), "{output:?}");
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body, json!({ "tabs": [3, 5] }));
}

#[tokio::test(flavor = "multi_thread")]
async fn open_reports_title_failure_without_failing() {
    let server = MockServer::bind().await;
    let home = TempDir::new().unwrap();
    let mut cmd = cef_client(&home);
    cmd.args(["--json", "--url", &server.url(), "open", "https://a.test"]);
    let run = tokio::task::spawn_blocking(move || cmd.output().unwrap());

    let mut peer = server.accept().await;
    let request = peer.recv_request().await;
    assert_eq!(request["method"], "openTab");
    assert_eq!(request["params"]["url"], "https://a.test");
    assert_eq!(request["params"]["wait_until_loaded"], true);
    peer.reply(&request, json!({ "id": 7 })).await;
    let request = peer.recv_request().await;
    assert_eq!(request["method"], "getTitle");
    peer.reply_error(&request, "tab is loading", None).await;
    peer.expect_close().await;

    let output = run.await.unwrap();
    assert!(output.status.success(), "{output:?}");
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body, json!({ "success": true, "tab": 7, "title": "" }));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("could not read tab title"), "{stderr}");
    assert!(stderr.contains("tab is loading"), "{stderr}");
}
