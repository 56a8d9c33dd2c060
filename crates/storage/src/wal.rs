// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead journal for broker operations
//!
//! One JSON entry per line, each carrying a sequence number and a CRC32 of
//! the serialized operation. Replay skips entries that fail to parse or
//! verify. Opening for append cuts a torn final line left by a crash, so new
//! entries always start on a line of their own.

use em_core::QueueOp;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur in journal operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only journal of queue operations
pub struct Wal {
    file: File,
    sequence: u64,
}

impl Wal {
    /// Open or create a journal at the given path
    pub fn open(path: &Path) -> Result<Self, WalError> {
        let sequence = read_entries(path)?
            .last()
            .map(|entry| entry.seq)
            .unwrap_or(0);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        trim_torn_tail(&file)?;

        Ok(Self { file, sequence })
    }

    /// Atomically replace the journal with `ops` and open it for appending.
    ///
    /// Sequence numbers restart at 1.
    pub fn rewrite(path: &Path, ops: &[QueueOp]) -> Result<Self, WalError> {
        let tmp = path.with_extension("wal.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for (seq, op) in (1..).zip(ops) {
                let entry = WalEntry::new(seq, op.clone())?;
                writeln!(writer, "{}", serde_json::to_string(&entry)?)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Self::open(path)
    }

    /// Append an operation and flush it to disk
    pub fn append(&mut self, op: &QueueOp) -> Result<u64, WalError> {
        let entry = WalEntry::new(self.sequence + 1, op.clone())?;
        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{}", line)?;
        self.file.sync_all()?;
        self.sequence = entry.seq;
        Ok(self.sequence)
    }

    /// Sequence number of the last appended entry
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Replay all valid operations from the journal
    pub fn replay(path: &Path) -> Result<Vec<QueueOp>, WalError> {
        Ok(read_entries(path)?.into_iter().map(|e| e.op).collect())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WalEntry {
    seq: u64,
    op: QueueOp,
    checksum: u32,
}

impl WalEntry {
    fn new(seq: u64, op: QueueOp) -> Result<Self, WalError> {
        let checksum = checksum(&op)?;
        Ok(Self { seq, op, checksum })
    }

    fn verify(&self) -> bool {
        checksum(&self.op).is_ok_and(|c| c == self.checksum)
    }
}

fn checksum(op: &QueueOp) -> Result<u32, WalError> {
    let json = serde_json::to_vec(op)?;
    Ok(crc32fast::hash(&json))
}

/// Drop bytes after the last newline
fn trim_torn_tail(file: &File) -> Result<(), WalError> {
    let mut file = file;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut contents = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut contents)?;
    let keep = contents
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |i| i + 1);
    tracing::warn!(dropped = contents.len() - keep, "truncating torn journal tail");
    file.set_len(keep as u64)?;
    file.sync_all()?;
    Ok(())
}

fn read_entries(path: &Path) -> Result<Vec<WalEntry>, WalError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WalEntry>(&line) {
            Ok(entry) if entry.verify() => entries.push(entry),
            Ok(entry) => {
                tracing::warn!(line = index + 1, seq = entry.seq, "checksum mismatch, skipping entry");
            }
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "unreadable entry, skipping");
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
