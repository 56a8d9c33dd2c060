// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration specs
//!
//! Verify config file discovery and command-line precedence.

use crate::prelude::*;

fn config_with_listen(addr: std::net::SocketAddr) -> String {
    format!(
        "max_workers = 3\nlog_path = \"emd.log\"\n\n[webhook]\nlisten = \"{}\"\n",
        addr
    )
}

#[test]
fn config_file_in_working_directory_is_used() {
    let temp = Project::empty();
    let addr = free_addr();
    temp.file("emd.toml", &config_with_listen(addr));

    let mut daemon = temp.emd().spawn();
    daemon.wait_ready(addr);

    let found = wait_for(SPEC_WAIT_MAX_MS, || {
        temp.read("emd.log").contains("max_workers=3")
    });
    assert!(found, "log:\n{}", temp.read("emd.log"));
}

#[test]
fn worker_argument_overrides_config_file() {
    let temp = Project::empty();
    let addr = free_addr();
    temp.file("emd.toml", &config_with_listen(addr));

    let mut daemon = temp.emd().args(&["7"]).spawn();
    daemon.wait_ready(addr);

    let found = wait_for(SPEC_WAIT_MAX_MS, || {
        temp.read("emd.log").contains("max_workers=7")
    });
    assert!(found, "log:\n{}", temp.read("emd.log"));
}

#[test]
fn non_positive_worker_argument_falls_through_to_config() {
    let temp = Project::empty();
    let addr = free_addr();
    temp.file("emd.toml", &config_with_listen(addr));

    let mut daemon = temp.emd().args(&["0"]).spawn();
    daemon.wait_ready(addr);

    let found = wait_for(SPEC_WAIT_MAX_MS, || {
        temp.read("emd.log").contains("max_workers=3")
    });
    assert!(found, "log:\n{}", temp.read("emd.log"));
}

#[test]
fn explicit_config_must_exist() {
    let temp = Project::empty();
    temp.emd()
        .args(&["--config", "nope.toml"])
        .fails()
        .stderr_has("nope.toml");
}

#[test]
fn unknown_config_key_is_rejected() {
    let temp = Project::empty();
    temp.file("emd.toml", "max_wrokers = 3\n");

    temp.emd().fails().stderr_has("max_wrokers");
}
