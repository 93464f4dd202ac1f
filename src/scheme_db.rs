// src/scheme_db.rs

use crate::error::Result;
use crate::processor::SchemeOutcome;
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

pub struct SchemeStore {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub uid: String,
    pub source: String,
    pub raw_text: String,
    pub cleaned_text: Option<String>,
    pub audit_json: Option<String>,
    pub is_processed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    pub id: i64,
    pub document_uid: String,
    pub scheme_type: String,
    pub scheme_subtype: String,
    pub reasoning: String,
    pub fields_json: String,
    pub config_json: String,
}

/// Row counts: (documents, processed documents, results)
pub type StoreCounts = (usize, usize, usize);

impl SchemeStore {
    /// Open (or create) the store. Parent directories are created for file paths.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

             CREATE TABLE IF NOT EXISTS documents (
                uid TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                raw_text TEXT NOT NULL,
                cleaned_text TEXT,
                audit_json TEXT,
                is_processed INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
             );

             CREATE TABLE IF NOT EXISTS scheme_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_uid TEXT NOT NULL,
                scheme_type TEXT NOT NULL,
                scheme_subtype TEXT NOT NULL,
                reasoning TEXT NOT NULL,
                fields_json TEXT NOT NULL,
                config_json TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (document_uid) REFERENCES documents(uid) ON DELETE CASCADE
             );

             CREATE INDEX IF NOT EXISTS idx_documents_is_processed ON documents(is_processed);
             CREATE INDEX IF NOT EXISTS idx_results_document_uid ON scheme_results(document_uid);",
        )?;

        info!("Database initialized successfully");
        Ok(Self { conn })
    }

    /// Stable id from the source name and raw text.
    pub fn generate_uid(source: &str, raw_text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(raw_text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Insert a document, or keep the existing row when the uid is known.
    /// Returns the uid.
    pub fn upsert_document(&self, source: &str, raw_text: &str) -> Result<String> {
        let uid = Self::generate_uid(source, raw_text);
        self.conn.execute(
            "INSERT INTO documents (uid, source, raw_text)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(uid) DO UPDATE SET source = excluded.source",
            params![uid, source, raw_text],
        )?;
        info!(uid = %uid, source = %source, "Document stored");
        Ok(uid)
    }

    /// Store cleaning output and the generated config, and mark the document processed.
    pub fn record_outcome(&self, uid: &str, outcome: &SchemeOutcome) -> Result<i64> {
        let audit_json = serde_json::to_string(&outcome.cleaning.entries)?;
        let fields_json = serde_json::to_string(&outcome.fields.to_report())?;
        let config_json = outcome.config.to_json().to_string();

        self.conn.execute(
            "UPDATE documents
             SET cleaned_text = ?1, audit_json = ?2, is_processed = 1
             WHERE uid = ?3",
            params![outcome.cleaning.cleaned_text, audit_json, uid],
        )?;

        self.conn.execute(
            "INSERT INTO scheme_results
                (document_uid, scheme_type, scheme_subtype, reasoning, fields_json, config_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                uid,
                outcome.classification.scheme_type.code(),
                outcome.classification.subtype.code(),
                outcome.reasoning,
                fields_json,
                config_json,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(uid = %uid, result_id = id, classification = %outcome.classification, "Result recorded");
        Ok(id)
    }

    pub fn get_document(&self, uid: &str) -> Result<Option<StoredDocument>> {
        let doc = self
            .conn
            .query_row(
                "SELECT uid, source, raw_text, cleaned_text, audit_json, is_processed
                 FROM documents
                 WHERE uid = ?1",
                params![uid],
                Self::row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    /// Most recent result for a document.
    pub fn latest_result(&self, uid: &str) -> Result<Option<StoredResult>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, document_uid, scheme_type, scheme_subtype, reasoning, fields_json, config_json
                 FROM scheme_results
                 WHERE document_uid = ?1
                 ORDER BY id DESC
                 LIMIT 1",
                params![uid],
                |row| {
                    Ok(StoredResult {
                        id: row.get(0)?,
                        document_uid: row.get(1)?,
                        scheme_type: row.get(2)?,
                        scheme_subtype: row.get(3)?,
                        reasoning: row.get(4)?,
                        fields_json: row.get(5)?,
                        config_json: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    pub fn get_unprocessed_documents(&self) -> Result<Vec<StoredDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT uid, source, raw_text, cleaned_text, audit_json, is_processed
             FROM documents
             WHERE is_processed = 0
             ORDER BY created_at, uid",
        )?;
        let docs = stmt
            .query_map([], Self::row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(docs)
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredDocument> {
        Ok(StoredDocument {
            uid: row.get(0)?,
            source: row.get(1)?,
            raw_text: row.get(2)?,
            cleaned_text: row.get(3)?,
            audit_json: row.get(4)?,
            is_processed: row.get(5)?,
        })
    }

    pub fn get_counts(&self) -> Result<StoreCounts> {
        let total: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let processed: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE is_processed = 1",
            [],
            |row| row.get(0),
        )?;
        let results: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM scheme_results", [], |row| row.get(0))?;
        Ok((total, processed, results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::lexicon::Lexicon;
    use crate::processor::SchemeProcessor;

    #[test]
    fn test_uid_generation() {
        let uid1 = SchemeStore::generate_uid("mail.txt", "body");
        let uid2 = SchemeStore::generate_uid("mail.txt", "body");
        let uid3 = SchemeStore::generate_uid("mail.txt", "other body");
        let uid4 = SchemeStore::generate_uid("mail.tx", "tbody");

        assert_eq!(uid1, uid2);
        assert_ne!(uid1, uid3);
        assert_ne!(uid1, uid4);
        assert_eq!(uid1.len(), 64);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = SchemeStore::in_memory().unwrap();
        let a = store.upsert_document("mail.txt", "body").unwrap();
        let b = store.upsert_document("mail.txt", "body").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.get_counts().unwrap(), (1, 0, 0));

        let unprocessed = store.get_unprocessed_documents().unwrap();
        assert_eq!(unprocessed.len(), 1);
        assert_eq!(unprocessed[0].raw_text, "body");
        assert!(store.get_document("missing").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_outcome() {
        let store = SchemeStore::in_memory().unwrap();
        let text = "Hi team, please find the scheme for the coupon offer.";
        let uid = store.upsert_document("mail.txt", text).unwrap();

        let processor = SchemeProcessor::new(&Lexicon::builtin().unwrap(), &Config::default()).unwrap();
        let outcome = processor.process_text(text, None, None).await;
        store.record_outcome(&uid, &outcome).unwrap();

        let doc = store.get_document(&uid).unwrap().unwrap();
        assert!(doc.is_processed);
        assert_eq!(doc.cleaned_text.as_deref(), Some(outcome.cleaning.cleaned_text.as_str()));

        let result = store.latest_result(&uid).unwrap().unwrap();
        assert_eq!(result.scheme_type, "SELL_SIDE");
        assert_eq!(result.scheme_subtype, "CP");
        let config: serde_json::Value = serde_json::from_str(&result.config_json).unwrap();
        assert_eq!(config["config_type"], "SS-CP");

        assert!(store.get_unprocessed_documents().unwrap().is_empty());
        assert_eq!(store.get_counts().unwrap(), (1, 1, 1));
    }
}
