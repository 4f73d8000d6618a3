// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `lesewerk analyze`: submit files, wait for results, print them, and write
// derived artifacts.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use lesewerk_client::{AnalysisOutcome, HttpTransport, Transport, run_batch};
use lesewerk_core::config::ClientConfig;
use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::report::ErrorReport;
use lesewerk_core::result::AnalysisResult;
use lesewerk_core::types::{AnalysisRequest, ModelSelector, OperationId, OutputOption};

use crate::render::ResultView;
use crate::summary::BatchSummary;

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Documents to analyze (PDF, images, Office files, HTML).
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// read, layout, general, invoice, receipt, id-document,
    /// bank-statement, credit-card, a prebuilt-* id, or custom:<model-id>.
    #[arg(short, long, default_value = "read")]
    pub model: String,

    /// Print normalized results as JSON instead of a text report.
    #[arg(long)]
    pub json: bool,

    /// Also request a searchable PDF and write it here. With several input
    /// files this is a directory.
    #[arg(long, value_name = "OUT")]
    pub searchable_pdf: Option<PathBuf>,

    /// Documents analyzed at the same time.
    #[arg(short, long, default_value_t = 4)]
    pub concurrency: usize,

    /// Locale hint for text recognition, e.g. en-US.
    #[arg(long)]
    pub locale: Option<String>,

    /// Page selection, e.g. 1-3,5.
    #[arg(long)]
    pub pages: Option<String>,

    /// JSON config file; environment variables override its values.
    #[arg(long, env = "LESEWERK_CONFIG")]
    pub config: Option<PathBuf>,
}

/// `--json` output for a whole run.
#[derive(Serialize)]
struct JsonReport<'a> {
    documents: Vec<JsonEntry<'a>>,
    summary: &'a BatchSummary,
}

/// One document in `--json` output.
#[derive(Serialize)]
struct JsonEntry<'a> {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    operation_id: Option<&'a OperationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    searchable_pdf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

pub async fn run(args: AnalyzeArgs) -> Result<ExitCode> {
    let model: ModelSelector = args.model.parse()?;
    let config = load_config(args.config.as_deref())?;
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config)?);

    let prepared: Vec<Result<AnalysisRequest>> = args
        .files
        .iter()
        .map(|path| build_request(path, &model, &args))
        .collect();

    let (requests, slots): (Vec<_>, Vec<_>) = prepared
        .into_iter()
        .map(|prepared| match prepared {
            Ok(request) => (Some(request), None),
            Err(err) => (None, Some(err)),
        })
        .unzip();
    let requests: Vec<AnalysisRequest> = requests.into_iter().flatten().collect();
    info!(files = args.files.len(), submitted = requests.len(), %model, "analyzing");

    let mut outcomes = run_batch(transport, config.tracker.clone(), requests, args.concurrency)
        .await
        .into_iter();
    let results: Vec<Result<AnalysisOutcome>> = slots
        .into_iter()
        .map(|local_err| match local_err {
            Some(err) => Err(err),
            None => outcomes.next().unwrap_or_else(|| Err(LesewerkError::Cancelled)),
        })
        .collect();

    let batch = args.files.len() > 1;
    let mut summary = BatchSummary::default();
    let mut entries = Vec::new();

    for (path, result) in args.files.iter().zip(&results) {
        let name = path.display().to_string();
        match result {
            Ok(outcome) => {
                let written = match (&outcome.searchable_pdf, &args.searchable_pdf) {
                    (Some(pdf), Some(out)) => {
                        let target = artifact_path(out, path, batch);
                        write_artifact(&target, pdf).map(|()| Some(target))
                    }
                    _ => Ok(None),
                };
                if let Err(err) = &written {
                    summary.record_failure();
                    report_failure(&name, err, args.json, &mut entries);
                    continue;
                }
                summary.record(&outcome.result);

                let written = written.ok().flatten();
                if args.json {
                    entries.push(JsonEntry {
                        file: name,
                        operation_id: Some(&outcome.operation_id),
                        result: Some(&outcome.result),
                        searchable_pdf: written.map(|p| p.display().to_string()),
                        error: None,
                    });
                } else {
                    print!("{}", ResultView::new(&name, &outcome.result));
                    if let Some(target) = written {
                        println!("Searchable PDF: {}", target.display());
                    }
                    println!();
                }
            }
            Err(err) => {
                summary.record_failure();
                report_failure(&name, err, args.json, &mut entries);
            }
        }
    }

    if args.json {
        let report = JsonReport {
            documents: entries,
            summary: &summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if batch || !summary.all_succeeded() {
        println!("{summary}");
    }
    info!(
        processed = summary.processed,
        failed = summary.failed,
        "analysis finished"
    );

    Ok(if summary.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn report_failure<'a>(
    name: &str,
    err: &LesewerkError,
    json: bool,
    entries: &mut Vec<JsonEntry<'a>>,
) {
    let report = ErrorReport::from_error(err);
    warn!(file = name, kind = %report.kind, "analysis failed");
    if json {
        entries.push(JsonEntry {
            file: name.to_string(),
            operation_id: None,
            result: None,
            searchable_pdf: None,
            error: Some(report),
        });
    } else {
        eprintln!("{name}: {report}\n");
    }
}

/// Defaults, then the optional config file, then environment variables.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let base = match path {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    base.with_env()
}

fn build_request(path: &Path, model: &ModelSelector, args: &AnalyzeArgs) -> Result<AnalysisRequest> {
    let bytes = std::fs::read(path)?;
    let extension = path.extension().and_then(|ext| ext.to_str());
    let mut request = AnalysisRequest::with_extension_hint(model.clone(), bytes, extension)?;
    if let Some(locale) = &args.locale {
        request = request.with_locale(locale.clone());
    }
    if let Some(pages) = &args.pages {
        request = request.with_pages(pages.clone());
    }
    if args.searchable_pdf.is_some() {
        request = request.with_output(OutputOption::SearchablePdf);
    }
    Ok(request)
}

/// Where the searchable PDF for `input` goes. A single input writes to
/// `out` itself; a batch writes `<stem>.searchable.pdf` inside `out`.
pub fn artifact_path(out: &Path, input: &Path, batch: bool) -> PathBuf {
    if !batch {
        return out.to_path_buf();
    }
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    out.join(format!("{stem}.searchable.pdf"))
}

/// Write artifact bytes, creating parent directories as needed.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote searchable PDF");
    Ok(())
}
