// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `em translate` output

use crate::prelude::*;

#[test]
fn translate_prints_one_json_record_per_alert() {
    let temp = Project::empty();
    temp.file("alerts.json", THREE_ALERTS);

    let run = temp.em().args(&["translate", "alerts.json"]).passes();

    let stdout = run.stdout();
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    run.stdout_has(
        r#"{"tenant":"customer1","namespace":"default","event_type":"HighCPU","site":"alertmanager.example.com","timestamp":"2026-03-01T10:00:00Z","message":"CPU above 90%","severity":"critical","labels":{"alertname":"HighCPU","instance":"node-1","severity":"critical"},"annotations":{"description":"CPU above 90%"}}"#,
    )
    .stdout_has(r#""event_type":"DiskFull""#)
    .stdout_has(r#""event_type":"NodeDown""#);
}

#[test]
fn translate_text_format() {
    let temp = Project::empty();
    temp.file("alerts.json", THREE_ALERTS);

    temp.em()
        .args(&["translate", "alerts.json", "--format", "text"])
        .passes()
        .stdout_eq(
            "2026-03-01T10:00:00+00:00 critical HighCPU site=alertmanager.example.com CPU above 90%\n\
             2026-03-01T10:05:00+00:00 warning  DiskFull site=alertmanager.example.com disk at 95%\n\
             2026-03-01T10:10:00+00:00 -        NodeDown site=alertmanager.example.com\n",
        );
}

#[test]
fn translate_stamps_tenant_and_namespace() {
    let temp = Project::empty();
    temp.file("alerts.json", THREE_ALERTS);

    temp.em()
        .args(&[
            "translate",
            "alerts.json",
            "--tenant",
            "acme",
            "--namespace",
            "prod",
        ])
        .passes()
        .stdout_has(r#""tenant":"acme","namespace":"prod""#);
}

#[test]
fn translate_reads_stdin() {
    let temp = Project::empty();

    temp.em()
        .args(&["translate", "-"])
        .stdin(THREE_ALERTS)
        .passes()
        .stdout_has(r#""event_type":"HighCPU""#);
}

#[test]
fn translate_payload_without_alerts_prints_nothing() {
    let temp = Project::empty();
    temp.file("resolved.json", r#"{"status": "resolved", "alerts": []}"#);

    temp.em()
        .args(&["translate", "resolved.json"])
        .passes()
        .stdout_eq("");
}
