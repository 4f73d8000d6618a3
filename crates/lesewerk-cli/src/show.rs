// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `lesewerk show`: normalize and print a saved service response without
// contacting the service.

use std::path::{Path, PathBuf};

use clap::Args;
use serde_json::Value;

use lesewerk_core::error::Result;
use lesewerk_core::result::AnalysisResult;
use lesewerk_core::types::{ModelSelector, RawPayload};

use crate::render::ResultView;

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Saved response: either the `analyzeResult` object or the whole
    /// status body that contains it.
    pub file: PathBuf,

    /// Model the response was produced by.
    #[arg(short, long, default_value = "read")]
    pub model: String,

    /// Print the normalized result as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ShowArgs) -> Result<()> {
    let model: ModelSelector = args.model.parse()?;
    let result = load_result(&args.file, &model)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", ResultView::new(&args.file.display().to_string(), &result));
    }
    Ok(())
}

/// Read a saved response and normalize it for `model`.
pub fn load_result(path: &Path, model: &ModelSelector) -> Result<AnalysisResult> {
    let text = std::fs::read_to_string(path)?;
    let mut value: Value = serde_json::from_str(&text)?;
    if let Some(inner) = value.get_mut("analyzeResult") {
        value = inner.take();
    }
    lesewerk_document::normalize(model, &RawPayload::new(value))
}
