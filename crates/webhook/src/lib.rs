// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Alertmanager webhook ingestion

mod alert;
mod server;
mod translate;

pub use alert::{Alert, AlertPayload};
pub use server::{router, WebhookError, WebhookState, SUCCESS_BODY};
pub use translate::{TranslateError, Translator};
