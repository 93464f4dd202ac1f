// src/cleaner/mod.rs

pub mod filters;
pub mod normalize;
pub mod pipeline;
pub mod protection;

pub use normalize::normalize_text;
pub use pipeline::CleaningPipeline;
pub use protection::ProtectionClassifier;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Upper bound on disclaimer start markers examined per document.
pub const MAX_DISCLAIMER_PASSES: usize = 10;

pub(crate) static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").expect("static regex")
});

static PARAGRAPH_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockClass {
    Table,
    Protected,
    Cleanable,
}

/// One paragraph of input, as produced by [`segment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    content: String,
}

impl TextBlock {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

/// Split on blank lines; blocks are trimmed and empty ones dropped.
pub fn segment(text: &str) -> Vec<TextBlock> {
    PARAGRAPH_BREAK_RE
        .split(text)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|b| TextBlock {
            content: b.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Header,
    Footer,
    CcBlock,
    Disclaimer,
    Noise,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub category: AuditCategory,
    pub preview: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,
}

impl AuditEntry {
    pub fn new(category: AuditCategory, text: &str, preview_chars: usize) -> Self {
        Self {
            category,
            preview: preview(text, preview_chars),
            matched_keywords: Vec::new(),
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.matched_keywords = keywords;
        self
    }
}

/// Whitespace-collapsed prefix of `text`, at most `max` characters.
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    }
}

/// Outcome of one cleaning run.
///
/// `removed` and `retained` count paragraphs after segmentation only.
/// Lines and disclaimer spans cut before segmentation, and lines stripped
/// from paragraphs, are counted in `fragments_removed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningResult {
    pub cleaned_text: String,
    pub paragraphs: usize,
    pub removed: usize,
    pub retained: usize,
    pub protected: usize,
    pub tables_protected: usize,
    pub fragments_removed: usize,
    pub entries: Vec<AuditEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CleaningStats {
    pub original_length: usize,
    pub cleaned_length: usize,
    pub reduction_chars: usize,
    pub reduction_percent: f64,
}

/// Character counts and reduction percentage, rounded to two decimals.
pub fn cleaning_stats(original: &str, cleaned: &str) -> CleaningStats {
    let original_length = original.chars().count();
    let cleaned_length = cleaned.chars().count();
    let reduction_chars = original_length.saturating_sub(cleaned_length);
    let reduction_percent = if original_length == 0 {
        0.0
    } else {
        let pct = reduction_chars as f64 / original_length as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    };

    CleaningStats {
        original_length,
        cleaned_length,
        reduction_chars,
        reduction_percent,
    }
}
