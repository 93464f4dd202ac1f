// src/document.rs

use crate::error::{Result, SchemeError};
use crate::pdf_extract::{PdfContent, extract_text_from_pdf};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

const TABLE_SIDECAR: &str = "tables.csv";
const SHEET_SIDECAR: &str = "sheet.txt";
const DOCUMENT_EXTENSIONS: [&str; 3] = ["pdf", "txt", "eml"];

/// Where the email text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Text,
}

/// One input document with its optional table and spreadsheet texts.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub path: PathBuf,
    pub kind: SourceKind,
    pub email_text: String,
    pub table_text: Option<String>,
    pub sheet_text: Option<String>,
}

impl DocumentInput {
    /// Read `path` and any `<stem>.tables.csv` / `<stem>.sheet.txt` next to it.
    ///
    /// Scanned PDFs are an error since OCR is not available.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

        let (kind, email_text) = if is_pdf {
            let bytes = fs::read(path)?;
            match extract_text_from_pdf(&bytes) {
                PdfContent::Text(text) => (SourceKind::Pdf, text),
                PdfContent::ScannedImage => {
                    return Err(SchemeError::Document(format!(
                        "{} is a scanned PDF; OCR is not supported",
                        path.display()
                    )));
                }
                PdfContent::Error(e) => {
                    return Err(SchemeError::Document(format!("{}: {e}", path.display())));
                }
            }
        } else {
            (SourceKind::Text, fs::read_to_string(path)?)
        };

        let table_text = read_sidecar(path, TABLE_SIDECAR)?;
        let sheet_text = read_sidecar(path, SHEET_SIDECAR)?;

        info!(
            path = %path.display(),
            kind = ?kind,
            chars = email_text.chars().count(),
            has_table = table_text.is_some(),
            has_sheet = sheet_text.is_some(),
            "Loaded document"
        );

        Ok(Self {
            path: path.to_path_buf(),
            kind,
            email_text,
            table_text,
            sheet_text,
        })
    }

    /// File stem used to name stores and output folders.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

/// Documents directly inside `dir`, sorted by name. Sidecars are read with
/// their document and are not listed.
pub fn discover(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_document(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn is_document(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_ascii_lowercase();
    if name.starts_with('.')
        || name.ends_with(&format!(".{TABLE_SIDECAR}"))
        || name.ends_with(&format!(".{SHEET_SIDECAR}"))
    {
        return false;
    }
    DOCUMENT_EXTENSIONS.iter().any(|ext| name.ends_with(&format!(".{ext}")))
}

fn sidecar_path(path: &Path, suffix: &str) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    Some(path.with_file_name(format!("{stem}.{suffix}")))
}

fn read_sidecar(path: &Path, suffix: &str) -> Result<Option<String>> {
    let Some(sidecar) = sidecar_path(path, suffix) else {
        return Ok(None);
    };
    if !sidecar.exists() {
        debug!(path = %sidecar.display(), "No sidecar");
        return Ok(None);
    }
    let text = fs::read_to_string(&sidecar)?;
    if text.trim().is_empty() {
        warn!(path = %sidecar.display(), "Sidecar is empty, ignoring");
        return Ok(None);
    }
    Ok(Some(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_with_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let email = dir.path().join("june_offer.txt");
        fs::write(&email, "Hi team, please find the scheme details.").unwrap();
        fs::write(dir.path().join("june_offer.tables.csv"), "FSN,Support\nABC,100").unwrap();
        fs::write(dir.path().join("june_offer.sheet.txt"), "  \n").unwrap();

        let doc = DocumentInput::load(&email).unwrap();
        assert_eq!(doc.kind, SourceKind::Text);
        assert_eq!(doc.stem(), "june_offer");
        assert_eq!(doc.email_text, "Hi team, please find the scheme details.");
        assert_eq!(doc.table_text.as_deref(), Some("FSN,Support\nABC,100"));
        assert!(doc.sheet_text.is_none());
    }

    #[test]
    fn test_no_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let email = dir.path().join("mail.eml");
        fs::write(&email, "body").unwrap();

        let doc = DocumentInput::load(&email).unwrap();
        assert!(doc.table_text.is_none());
        assert!(doc.sheet_text.is_none());
    }

    #[test]
    fn test_broken_pdf_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("scan.PDF");
        fs::write(&pdf, b"not a pdf at all").unwrap();

        let err = DocumentInput::load(&pdf).unwrap_err();
        assert!(matches!(err, SchemeError::Document(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = DocumentInput::load("/nonexistent/dir/mail.txt").unwrap_err();
        assert!(matches!(err, SchemeError::Io(_)));
    }

    #[test]
    fn test_discover_skips_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "b_offer.txt",
            "b_offer.tables.csv",
            "b_offer.sheet.txt",
            "a_letter.PDF",
            "c_mail.eml",
            "notes.md",
            ".hidden.txt",
        ] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let names: Vec<String> = discover(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a_letter.PDF", "b_offer.txt", "c_mail.eml"]);
    }
}
