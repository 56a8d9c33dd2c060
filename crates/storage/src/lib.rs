// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable storage for the local broker: a checksummed journal and the
//! queue state materialized from it

mod state;
mod wal;

pub use state::{QueueState, StoredMessage};
pub use wal::{Wal, WalError};
