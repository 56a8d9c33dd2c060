// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle specs
//!
//! Verify startup, webhook ingestion, and signal-driven shutdown.

use crate::prelude::*;

fn webhook_url(addr: std::net::SocketAddr) -> String {
    format!("http://{}/webhook", addr)
}

#[test]
fn daemon_processes_webhook_and_stops_on_sigterm() {
    let temp = Project::empty();
    temp.file("alerts.json", THREE_ALERTS);
    let addr = free_addr();
    let listen = addr.to_string();

    let mut daemon = temp
        .emd()
        .args(&[
            "2",
            "--listen",
            &listen,
            "--data-dir",
            "data",
            "--log-file",
            "emd.log",
        ])
        .spawn();
    daemon.wait_ready(addr);

    temp.em()
        .args(&["send", "alerts.json", "--url", &webhook_url(addr)])
        .passes()
        .stdout_eq("successfully processed\n");

    let processed = wait_for(SPEC_WAIT_MAX_MS, || {
        temp.read("emd.log").matches("event processed").count() == 3
    });
    assert!(processed, "log:\n{}", temp.read("emd.log"));

    let output = daemon.terminate();
    assert!(output.status.success(), "emd exited with {}", output.status);

    let log = temp.read("emd.log");
    assert!(log.starts_with("--- emd: starting (pid: "), "log:\n{}", log);
    assert!(log.contains("Received SIGTERM"), "log:\n{}", log);
    assert!(log.contains("daemon shutdown complete"), "log:\n{}", log);
}

#[test]
fn daemon_rejects_malformed_payload() {
    let temp = Project::empty();
    temp.file("bad.json", "{\"alerts\": [");
    let addr = free_addr();
    let listen = addr.to_string();

    let mut daemon = temp
        .emd()
        .args(&["--listen", &listen, "--log-file", "emd.log"])
        .spawn();
    daemon.wait_ready(addr);

    temp.em()
        .args(&["send", "bad.json", "--url", &webhook_url(addr)])
        .fails()
        .stderr_has("Daemon rejected the payload (400)")
        .stderr_has("EOF while parsing");
}

#[test]
fn second_daemon_on_same_data_dir_fails() {
    let temp = Project::empty();
    let first_addr = free_addr();
    let first_listen = first_addr.to_string();

    let mut first = temp
        .emd()
        .args(&["--listen", &first_listen, "--data-dir", "data", "--log-file", "first.log"])
        .spawn();
    first.wait_ready(first_addr);

    let second_listen = free_addr().to_string();
    let output = temp
        .emd()
        .args(&["--listen", &second_listen, "--data-dir", "data"])
        .spawn()
        .wait_exit();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("daemon already running?"), "stderr:\n{}", stderr);
}

#[test]
fn startup_error_is_written_to_log() {
    let temp = Project::empty();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let listen = taken.local_addr().unwrap().to_string();

    let output = temp
        .emd()
        .args(&["--listen", &listen, "--log-file", "emd.log"])
        .spawn()
        .wait_exit();

    assert!(!output.status.success());
    let log = temp.read("emd.log");
    assert!(log.contains("ERROR Failed to start daemon: Failed to bind"), "log:\n{}", log);
}
