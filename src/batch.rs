// src/batch.rs

use crate::config_gen::{ConfigOutput, ConfigType};
use crate::document::{DocumentInput, discover};
use crate::error::Result;
use crate::output::{OutputFolder, folder_name, write_json};
use crate::processor::{SchemeOutcome, SchemeProcessor};
use crate::scheme::SchemeClassification;
use crate::scheme_db::SchemeStore;
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use time::OffsetDateTime;
use tracing::{Instrument, error, info, info_span};

const SUMMARY_STEM: &str = "summary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Processed,
    Failed,
}

/// One line of the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<SchemeClassification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_type: Option<ConfigType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub directory: String,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub files: Vec<FileReport>,
}

/// A stored, written document.
#[derive(Debug)]
pub struct ProcessedDocument {
    pub uid: String,
    pub outcome: SchemeOutcome,
    pub folder: OutputFolder,
}

/// Load, process, store and write one document.
pub async fn process_document(
    processor: &SchemeProcessor,
    store: &SchemeStore,
    path: &Path,
    output_dir: &Path,
    at: OffsetDateTime,
) -> Result<ProcessedDocument> {
    let doc = DocumentInput::load(path)?;
    let uid = store.upsert_document(&doc.path.to_string_lossy(), &doc.email_text)?;
    let outcome = processor.process(&doc).await;
    store.record_outcome(&uid, &outcome)?;

    let folder = OutputFolder::create_at(output_dir, &doc.stem(), at)?;
    folder.write_outcome(&outcome)?;
    Ok(ProcessedDocument {
        uid,
        outcome,
        folder,
    })
}

/// Process every document in `dir` and write `summary_<DDMMYYYY_HHMMSS>.json`
/// into `output_dir`. A file that cannot be loaded or yields no config is
/// counted as failed and the run goes on.
pub async fn process_dir(
    processor: &SchemeProcessor,
    store: &SchemeStore,
    dir: &Path,
    output_dir: &Path,
    at: OffsetDateTime,
) -> Result<(BatchSummary, PathBuf)> {
    let paths = discover(dir)?;
    info!(dir = %dir.display(), count = paths.len(), "Documents to process");

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let result = process_document(processor, store, path, output_dir, at)
            .instrument(info_span!("document", file = %file))
            .await;
        files.push(report(file, result));
    }

    let processed = files
        .iter()
        .filter(|f| f.status == FileStatus::Processed)
        .count();
    let summary = BatchSummary {
        directory: dir.display().to_string(),
        total: files.len(),
        processed,
        failed: files.len() - processed,
        files,
    };

    fs::create_dir_all(output_dir)?;
    let summary_path = output_dir.join(format!("{}.json", folder_name(SUMMARY_STEM, at)?));
    write_json(&summary_path, &serde_json::to_value(&summary)?)?;
    info!(
        total = summary.total,
        processed = summary.processed,
        failed = summary.failed,
        summary = %summary_path.display(),
        "Batch complete"
    );
    Ok((summary, summary_path))
}

fn report(file: String, result: Result<ProcessedDocument>) -> FileReport {
    match result {
        Ok(done) => {
            let config_error = match &done.outcome.config {
                ConfigOutput::Error { error } => Some(error.clone()),
                _ => None,
            };
            FileReport {
                file,
                status: if config_error.is_some() {
                    FileStatus::Failed
                } else {
                    FileStatus::Processed
                },
                classification: Some(done.outcome.classification),
                config_type: done.outcome.config.config_type(),
                output: Some(done.folder.path().display().to_string()),
                error: config_error,
            }
        }
        Err(e) => {
            error!(file = %file, error = %e, "Document failed");
            FileReport {
                file,
                status: FileStatus::Failed,
                classification: None,
                config_type: None,
                output: None,
                error: Some(e.to_string()),
            }
        }
    }
}
