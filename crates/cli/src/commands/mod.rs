// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod send;
pub mod translate;

use std::io::Read;
use std::path::Path;

use crate::error::EmError;

/// Read a payload file, or stdin when the path is `-`
pub fn read_payload(path: &Path) -> Result<Vec<u8>, EmError> {
    let result = if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).map(|_| buf)
    } else {
        std::fs::read(path)
    };
    result.map_err(|e| EmError::unreadable_payload(path, e))
}
