// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error reporting

use crate::prelude::*;

#[test]
fn missing_payload_file() {
    let temp = Project::empty();
    temp.em()
        .args(&["translate", "missing.json"])
        .fails()
        .stderr_has("error: Cannot read payload 'missing.json'")
        .stderr_has("suggestions:");
}

#[test]
fn malformed_payload() {
    let temp = Project::empty();
    temp.file("bad.json", "{\"alerts\": [");

    temp.em()
        .args(&["translate", "bad.json"])
        .fails()
        .stderr_has("error: Payload could not be translated")
        .stderr_has("EOF while parsing");
}

#[test]
fn hostless_external_url() {
    let temp = Project::empty();
    temp.file(
        "hostless.json",
        r#"{"externalURL": "", "alerts": [{"labels": {"alertname": "A"}}]}"#,
    );

    temp.em()
        .args(&["translate", "hostless.json"])
        .fails()
        .stderr_has("external URL has no host");
}

#[test]
fn alert_without_alertname() {
    let temp = Project::empty();
    temp.file(
        "unnamed.json",
        r#"{"externalURL": "http://am:9093", "alerts": [{"labels": {"severity": "critical"}}]}"#,
    );

    temp.em()
        .args(&["translate", "unnamed.json"])
        .fails()
        .stderr_has("missing required field: event_type");
}

#[test]
fn send_without_daemon() {
    let temp = Project::empty();
    temp.file("alerts.json", THREE_ALERTS);
    let url = format!("http://{}/webhook", free_addr());

    temp.em()
        .args(&["send", "alerts.json", "--url", &url])
        .fails()
        .stderr_has("Daemon not reachable")
        .stderr_has("Start the daemon: emd");
}

#[test]
fn unknown_command() {
    let temp = Project::empty();
    temp.em()
        .args(&["frobnicate"])
        .fails()
        .stderr_has("unrecognized subcommand");
}
