//! CLI behaviour of the `clb` binary
//!
//! Benchmark runs target a line cache server started inside the test
//! process, so no external cache is needed.

use assert_cmd::prelude::*;
use cache_latency_bench::server::{LineCacheServer, ServerConfig, ServerHandle};
use predicates::prelude::*;
use serde_json::Value;
use std::process::Command;
use tempfile::TempDir;

/// Command running in an empty directory so no stray .env is picked up
fn clb(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("clb").unwrap();
    cmd.current_dir(dir.path());
    for var in [
        "CACHE_TCP_ADDR",
        "BENCH_BACKENDS",
        "BENCH_ITERATIONS",
        "BENCH_MODE",
        "BENCH_CONCURRENCY",
        "BENCH_FAILURE_POLICY",
        "CALL_TIMEOUT_MS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Server on a runtime that keeps serving while the test blocks on the child
fn start_server() -> (tokio::runtime::Runtime, ServerHandle) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let handle = runtime.block_on(async {
        LineCacheServer::bind(ServerConfig::default())
            .await
            .unwrap()
            .spawn()
            .unwrap()
    });
    (runtime, handle)
}

#[test]
fn test_help_topics() {
    let dir = TempDir::new().unwrap();
    clb(&dir)
        .args(["--help-topic", "modes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bounded"));

    clb(&dir)
        .args(["--help-topic", "env"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BENCH_ITERATIONS"));

    clb(&dir)
        .args(["--help-topic", "nonsense"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown help topic"));
}

#[test]
fn test_conflicting_and_invalid_flags() {
    let dir = TempDir::new().unwrap();
    clb(&dir)
        .args(["--color", "--no-color"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot specify both"));

    clb(&dir)
        .args(["--serve", "--json"])
        .assert()
        .failure();

    clb(&dir)
        .args(["--backend", "memcached", "-n", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid --backend"));

    clb(&dir)
        .args(["--mode", "sometimes", "--backend", "tcp"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid --mode"));

    clb(&dir)
        .args(["--operation", "delete"])
        .assert()
        .failure();
}

#[test]
fn test_json_run_against_local_server() {
    let (_runtime, server) = start_server();
    let dir = TempDir::new().unwrap();

    let output = clb(&dir)
        .args(["--backend", "tcp", "-n", "3", "--json", "--value", "sunny 25"])
        .args(["--tcp-addr", &server.addr().to_string()])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    for key in ["LineTcpSet", "LineTcpGet"] {
        let cell = &report[key];
        assert_eq!(cell["samples"], 3, "{}", key);
        assert_eq!(cell["failures"], 0, "{}", key);
        assert!(cell["min"].as_f64().unwrap() <= cell["average"].as_f64().unwrap());
        assert!(cell["average"].as_f64().unwrap() <= cell["max"].as_f64().unwrap());
    }
}

#[test]
fn test_table_run_against_local_server() {
    let (_runtime, server) = start_server();
    let dir = TempDir::new().unwrap();

    clb(&dir)
        .args(["--backend", "tcp,tcp-pool", "-n", "5", "--mode", "bounded:2", "--no-color"])
        .args(["--operation", "set-highload-parallel"])
        .args(["--tcp-addr", &server.addr().to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache Latency Benchmark Results"))
        .stdout(predicate::str::contains("LineTcpPool"))
        .stdout(predicate::str::contains("bounded(2)"))
        .stdout(predicate::str::contains("Fastest Set:"));
}

#[test]
fn test_unreachable_backend_exits_with_failure() {
    let dir = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let output = clb(&dir)
        .args(["--backend", "tcp", "-n", "2", "--json", "--operation", "set-highload"])
        .args(["--tcp-addr", &addr])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(6));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["LineTcpSet"]["error"]["category"], "BENCH");
}
