//! Scheme extraction: clean vendor scheme emails, classify them and emit
//! retailer-hub configuration.

pub mod batch;
pub mod classifier;
pub mod cleaner;
pub mod config;
pub mod config_gen;
pub mod document;
pub mod error;
pub mod lexicon;
pub mod llm_extract;
pub mod mapping;
pub mod output;
pub mod pdf_extract;
pub mod processor;
pub mod scheme;
pub mod scheme_db;

pub use error::{Result, SchemeError};
