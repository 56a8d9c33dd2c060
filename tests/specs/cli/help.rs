// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Help and version output

use crate::prelude::*;

#[test]
fn em_help_lists_commands() {
    let temp = Project::empty();
    temp.em()
        .args(&["--help"])
        .passes()
        .stdout_has("translate")
        .stdout_has("send");
}

#[test]
fn em_version_matches_package() {
    let temp = Project::empty();
    temp.em()
        .args(&["--version"])
        .passes()
        .stdout_eq(&format!("em {}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn emd_help_shows_worker_argument_and_flags() {
    let temp = Project::empty();
    temp.emd()
        .args(&["--help"])
        .passes()
        .stdout_has("[MAX_WORKERS]")
        .stdout_has("--config")
        .stdout_has("--listen")
        .stdout_has("--data-dir")
        .stdout_has("--drain-timeout");
}
