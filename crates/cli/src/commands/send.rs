// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `em send <file>` - Post a webhook payload to a running daemon

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::read_payload;
use crate::client::{resolve_url, timeout_request, WebhookClient};
use crate::error::EmError;

#[derive(Args)]
pub struct SendArgs {
    /// Alertmanager webhook payload ("-" for stdin)
    pub file: PathBuf,

    /// Webhook endpoint (default: $EM_WEBHOOK_URL or http://127.0.0.1:8080/webhook)
    #[arg(long)]
    pub url: Option<String>,
}

pub fn send(args: SendArgs) -> Result<()> {
    let raw = read_payload(&args.file)?;
    let client = WebhookClient::new(resolve_url(args.url), timeout_request());
    let body = client
        .send(&raw)
        .map_err(|e| EmError::send_failed(client.url(), e))?;
    println!("{}", body.trim_end());
    Ok(())
}
