//! Error types for scheme extraction

use thiserror::Error;

/// Errors surfaced by the configuration, data-loading and I/O layers.
///
/// The deterministic core (cleaning, classification, config generation)
/// does not return these for bad input; it fails open or returns an
/// error-tagged `ConfigOutput` instead.
#[derive(Error, Debug)]
pub enum SchemeError {
    /// Invalid or inconsistent configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Keyword data could not be parsed
    #[error("Lexicon error: {0}")]
    Lexicon(String),

    /// A regex in the keyword data failed to compile
    #[error("Invalid pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A (type, subtype) pair outside the taxonomy
    #[error("Invalid classification: {scheme_type} / {subtype}")]
    InvalidClassification { scheme_type: String, subtype: String },

    /// Input document could not be turned into text
    #[error("Document error: {0}")]
    Document(String),

    /// LLM endpoint or response error
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Timestamp format error: {0}")]
    Time(#[from] time::error::Format),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SchemeError>;
