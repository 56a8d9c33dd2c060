// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `em translate <file>` - Show the events a webhook payload would produce

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use em_webhook::Translator;

use super::read_payload;
use crate::error::EmError;
use crate::output::{render_records, OutputFormat};

#[derive(Args)]
pub struct TranslateArgs {
    /// Alertmanager webhook payload ("-" for stdin)
    pub file: PathBuf,

    /// Tenant stamped on every event
    #[arg(long, default_value = "customer1")]
    pub tenant: String,

    /// Namespace stamped on every event
    #[arg(long, default_value = "default")]
    pub namespace: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

pub fn translate(args: TranslateArgs) -> Result<()> {
    let raw = read_payload(&args.file)?;
    let records = Translator::new(args.tenant, args.namespace)
        .translate(&raw)
        .map_err(EmError::invalid_payload)?;
    print!("{}", render_records(&records, args.format)?);
    Ok(())
}
