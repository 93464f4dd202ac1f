// src/output.rs

use crate::error::Result;
use crate::llm_extract::ExtractionInput;
use crate::processor::SchemeOutcome;
use serde_json::json;
use std::{
    fs,
    path::{Path, PathBuf},
};
use time::{OffsetDateTime, macros::format_description};
use tracing::info;

pub const CLEANED_FILE: &str = "cleaned.txt";
pub const AUDIT_FILE: &str = "audit.json";
pub const FIELDS_FILE: &str = "fields.json";
pub const CONFIG_FILE: &str = "config.json";
pub const CONTEXT_FILE: &str = "context.txt";
pub const CONTEXT_JSON_FILE: &str = "context.json";

/// `<stem>_<DDMMYYYY_HHMMSS>`
pub fn folder_name(stem: &str, at: OffsetDateTime) -> Result<String> {
    let stamp = at.format(format_description!(
        "[day][month][year]_[hour][minute][second]"
    ))?;
    Ok(format!("{stem}_{stamp}"))
}

/// Current local time, UTC if the offset is unknown.
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Per-run folder holding the artifacts of one processed document.
#[derive(Debug, Clone)]
pub struct OutputFolder {
    dir: PathBuf,
}

impl OutputFolder {
    /// Folder stamped with [`local_now`].
    pub fn create(output_dir: impl AsRef<Path>, stem: &str) -> Result<Self> {
        Self::create_at(output_dir, stem, local_now())
    }

    pub fn create_at(output_dir: impl AsRef<Path>, stem: &str, at: OffsetDateTime) -> Result<Self> {
        let dir = output_dir.as_ref().join(folder_name(stem, at)?);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn write_outcome(&self, outcome: &SchemeOutcome) -> Result<()> {
        fs::write(self.dir.join(CLEANED_FILE), &outcome.cleaning.cleaned_text)?;

        let audit = json!({
            "stats": outcome.stats,
            "paragraphs": outcome.cleaning.paragraphs,
            "removed": outcome.cleaning.removed,
            "retained": outcome.cleaning.retained,
            "protected": outcome.cleaning.protected,
            "tables_protected": outcome.cleaning.tables_protected,
            "fragments_removed": outcome.cleaning.fragments_removed,
            "entries": outcome.cleaning.entries,
        });
        write_json(&self.dir.join(AUDIT_FILE), &audit)?;

        let fields = json!({
            "classification": outcome.classification,
            "classification_source": outcome.classification_source,
            "reasoning": outcome.reasoning,
            "keyword_matches": outcome.keyword.matched,
            "fields": outcome.fields.to_report(),
            "resolved_fsns": outcome.fields.resolved_fsns(),
            "enrichment": outcome.enrichment,
        });
        write_json(&self.dir.join(FIELDS_FILE), &fields)?;

        write_json(&self.dir.join(CONFIG_FILE), &outcome.config.to_json())?;

        info!(path = %self.dir.display(), "Wrote output folder");
        Ok(())
    }

    /// Extractor input as one sectioned text and as separate JSON strings.
    pub fn write_context(&self, input: &ExtractionInput) -> Result<()> {
        fs::write(self.dir.join(CONTEXT_FILE), input.render())?;
        write_json(&self.dir.join(CONTEXT_JSON_FILE), &serde_json::to_value(input)?)?;
        info!(path = %self.dir.display(), "Wrote extraction context");
        Ok(())
    }
}

pub(crate) fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::lexicon::Lexicon;
    use crate::processor::SchemeProcessor;
    use time::macros::datetime;

    #[test]
    fn test_folder_name() {
        let at = datetime!(2024-06-05 09:07:03 UTC);
        assert_eq!(folder_name("offer", at).unwrap(), "offer_05062024_090703");
    }

    #[tokio::test]
    async fn test_writes_all_artifacts() {
        let root = tempfile::tempdir().unwrap();

        let processor = SchemeProcessor::new(&Lexicon::builtin().unwrap(), &Config::default()).unwrap();
        let outcome = processor
            .process_text("Hi team, please find the scheme for the coupon offer.", None, None)
            .await;

        let at = datetime!(2024-06-05 09:07:03 UTC);
        let folder = OutputFolder::create_at(root.path(), "mail", at).unwrap();
        folder.write_outcome(&outcome).unwrap();

        assert!(folder.path().ends_with("mail_05062024_090703"));
        let cleaned = fs::read_to_string(folder.path().join(CLEANED_FILE)).unwrap();
        assert_eq!(cleaned, outcome.cleaning.cleaned_text);

        let config: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(folder.path().join(CONFIG_FILE)).unwrap()).unwrap();
        assert_eq!(config["config_type"], "SS-CP");

        let fields: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(folder.path().join(FIELDS_FILE)).unwrap()).unwrap();
        assert_eq!(fields["fields"]["scheme_subtype"], "CP");
        assert_eq!(fields["classification_source"], "keywords");

        let audit: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(folder.path().join(AUDIT_FILE)).unwrap()).unwrap();
        assert!(audit["stats"]["original_length"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_writes_context() {
        let root = tempfile::tempdir().unwrap();
        let at = datetime!(2024-06-05 09:07:03 UTC);
        let folder = OutputFolder::create_at(root.path(), "mail", at).unwrap();
        let input = ExtractionInput::new("Scheme body", Some("FSN,Support\nA1,10"), None);
        folder.write_context(&input).unwrap();

        let text = fs::read_to_string(folder.path().join(CONTEXT_FILE)).unwrap();
        assert!(text.starts_with("EMAIL TEXT:\nScheme body\n\nTABLE DATA:\nFSN,Support"));
        assert!(text.ends_with("XLSX DATA:\nNo XLSX data provided"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(folder.path().join(CONTEXT_JSON_FILE)).unwrap()).unwrap();
        assert_eq!(json["email_text"], "Scheme body");
        assert_eq!(json["table_text"], "FSN,Support\nA1,10");
        assert_eq!(json["sheet_text"], "No XLSX data provided");
        // no extraction artifacts
        assert!(!folder.path().join(CONFIG_FILE).exists());
    }
}
