use super::{BlockClass, EMAIL_RE};
use crate::lexicon::Lexicon;
use once_cell::sync::Lazy;
use regex::Regex;

/// "word, 3+ spaces, word" columnar alignment.
static ALIGNED_COLUMNS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w{2,}\s{3,}\w{2,}").expect("static regex"));

/// Decides which paragraphs are kept unconditionally.
///
/// Tables are checked before business keywords, and a block that is either
/// never reaches a noise filter.
#[derive(Debug, Clone)]
pub struct ProtectionClassifier {
    patterns: Vec<Regex>,
}

impl ProtectionClassifier {
    pub fn new(lexicon: &Lexicon) -> Self {
        Self {
            patterns: lexicon.protected.clone(),
        }
    }

    pub fn classify(&self, block: &str) -> BlockClass {
        if self.is_table(block) {
            BlockClass::Table
        } else if self.is_protected(block) {
            BlockClass::Protected
        } else {
            BlockClass::Cleanable
        }
    }

    /// Pipe tables, or mostly tab/space aligned columns.
    pub fn is_table(&self, block: &str) -> bool {
        let lines: Vec<&str> = block
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return false;
        }

        let pipe_lines = lines.iter().filter(|l| l.matches('|').count() >= 2).count();
        if pipe_lines >= 2 {
            return true;
        }

        let aligned = lines
            .iter()
            .filter(|l| l.contains('\t') || ALIGNED_COLUMNS_RE.is_match(l))
            .count();
        lines.len() > 1 && aligned as f64 / lines.len() as f64 >= 0.5
    }

    /// Business vocabulary, amounts, dates, percentages or ids.
    pub fn is_protected(&self, block: &str) -> bool {
        // domains like order-desk@acme.com must not count as business terms
        let without_emails = EMAIL_RE.replace_all(block, "");
        self.patterns.iter().any(|p| p.is_match(&without_emails))
    }
}
