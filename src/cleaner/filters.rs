// src/cleaner/filters.rs

use super::protection::ProtectionClassifier;
use super::{AuditCategory, EMAIL_RE, MAX_DISCLAIMER_PASSES};
use crate::config::CleanerSettings;
use crate::lexicon::Lexicon;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

static CC_START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Cc\s*:").expect("static regex"));

static ADDRESS_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(From|To)\s*:").expect("static regex"));

/// Metadata lines that mark a short paragraph as a thread header.
static METADATA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(From|To|Cc|Sent|Subject)\s*:").expect("static regex"));

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:tel|ph|phone|mob|mobile|cell|m)\s*[:.]?\s*)?\+?[\d\s().-]{7,}$")
        .expect("static regex")
});

/// Result of a text-level filter: the surviving text and what was cut.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stripped {
    pub text: String,
    pub regions: Vec<String>,
}

/// A filter working across lines of a text, before or after segmentation.
pub trait TextFilter {
    fn name(&self) -> &'static str;
    fn category(&self) -> AuditCategory;
    fn strip(&self, text: &str) -> Stripped;

    fn is_match(&self, text: &str) -> bool {
        !self.strip(text).regions.is_empty()
    }
}

/// A filter that removes whole paragraphs.
pub trait BlockFilter {
    fn name(&self) -> &'static str;
    fn category(&self) -> AuditCategory;

    /// Evidence (possibly empty) when the block is noise.
    fn inspect(&self, block: &str) -> Option<Vec<String>>;

    /// Like `inspect`, but blocks that cannot be evaluated are never noise.
    fn detect(&self, block: &str) -> Option<Vec<String>> {
        if is_malformed(block) {
            debug!(filter = self.name(), "Block not evaluable, keeping");
            return None;
        }
        self.inspect(block)
    }

    fn is_match(&self, block: &str) -> bool {
        self.detect(block).is_some()
    }
}

/// Encoding debris: replacement characters or private-use glyphs.
pub fn is_malformed(block: &str) -> bool {
    block
        .chars()
        .any(|c| c == '\u{FFFD}' || ('\u{E000}'..='\u{F8FF}').contains(&c))
}

// ---------------------------------------------------------------------------
// Address blocks (line adjacency, run before segmentation)
// ---------------------------------------------------------------------------

/// `Cc:` lines and their wrapped continuation lines.
#[derive(Debug, Default, Clone)]
pub struct CcBlockFilter;

impl TextFilter for CcBlockFilter {
    fn name(&self) -> &'static str {
        "cc_block"
    }

    fn category(&self) -> AuditCategory {
        AuditCategory::CcBlock
    }

    fn strip(&self, text: &str) -> Stripped {
        let mut kept = Vec::new();
        let mut regions = Vec::new();
        let mut current: Option<Vec<&str>> = None;

        for line in text.split('\n') {
            let t = line.trim();
            if CC_START_RE.is_match(t) {
                if let Some(region) = current.take() {
                    regions.push(region.join("\n"));
                }
                current = Some(vec![t]);
                continue;
            }
            if let Some(region) = current.as_mut() {
                if EMAIL_RE.is_match(t) || t.ends_with(',') || t.ends_with(';') {
                    region.push(t);
                    continue;
                }
                if let Some(region) = current.take() {
                    regions.push(region.join("\n"));
                }
            }
            kept.push(line);
        }
        if let Some(region) = current.take() {
            regions.push(region.join("\n"));
        }

        Stripped {
            text: kept.join("\n"),
            regions,
        }
    }
}

/// `From:` / `To:` lines with multi-line recipient lists.
#[derive(Debug, Default, Clone)]
pub struct AddressBlockFilter;

impl TextFilter for AddressBlockFilter {
    fn name(&self) -> &'static str {
        "address_block"
    }

    fn category(&self) -> AuditCategory {
        AuditCategory::Header
    }

    fn strip(&self, text: &str) -> Stripped {
        let mut kept = Vec::new();
        let mut regions = Vec::new();
        let mut current: Option<Vec<&str>> = None;

        for line in text.split('\n') {
            let t = line.trim();
            if ADDRESS_START_RE.is_match(t) {
                if let Some(region) = current.take() {
                    regions.push(region.join("\n"));
                }
                current = Some(vec![t]);
                continue;
            }
            if let Some(region) = current.as_mut() {
                let continuation = !t.is_empty()
                    && (EMAIL_RE.is_match(t)
                        || t.contains('<')
                        || t.contains('>')
                        || t.ends_with(',')
                        || t.ends_with(';'));
                if continuation {
                    region.push(t);
                    continue;
                }
                if let Some(region) = current.take() {
                    regions.push(region.join("\n"));
                }
            }
            kept.push(line);
        }
        if let Some(region) = current.take() {
            regions.push(region.join("\n"));
        }

        Stripped {
            text: kept.join("\n"),
            regions,
        }
    }
}

// ---------------------------------------------------------------------------
// Thread headers and footers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HeaderFilter {
    line_patterns: Vec<Regex>,
    markers: Vec<Regex>,
}

impl HeaderFilter {
    pub fn new(lexicon: &Lexicon) -> Self {
        Self {
            line_patterns: lexicon.header_lines.clone(),
            markers: lexicon.header_markers.clone(),
        }
    }
}

impl BlockFilter for HeaderFilter {
    fn name(&self) -> &'static str {
        "header"
    }

    fn category(&self) -> AuditCategory {
        AuditCategory::Header
    }

    fn inspect(&self, block: &str) -> Option<Vec<String>> {
        let lines: Vec<&str> = block
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return None;
        }

        if let Some(m) = self.markers.iter().find_map(|p| p.find(block)) {
            return Some(vec![m.as_str().to_string()]);
        }

        let header_lines = lines
            .iter()
            .filter(|l| self.line_patterns.iter().any(|p| p.is_match(l)))
            .count();
        let has_metadata = lines.iter().any(|l| METADATA_RE.is_match(l));

        if header_lines * 2 >= lines.len() || (has_metadata && lines.len() < 5) {
            Some(Vec::new())
        } else {
            None
        }
    }
}

/// Mail-client links, pagination and unsubscribe boilerplate.
#[derive(Debug, Clone)]
pub struct FooterFilter {
    patterns: Vec<Regex>,
}

impl FooterFilter {
    pub fn new(lexicon: &Lexicon) -> Self {
        Self {
            patterns: lexicon.footer.clone(),
        }
    }
}

impl BlockFilter for FooterFilter {
    fn name(&self) -> &'static str {
        "footer"
    }

    fn category(&self) -> AuditCategory {
        AuditCategory::Footer
    }

    fn inspect(&self, block: &str) -> Option<Vec<String>> {
        self.patterns
            .iter()
            .find_map(|p| p.find(block))
            .map(|m| vec![m.as_str().trim().to_string()])
    }
}

// ---------------------------------------------------------------------------
// Disclaimers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DisclaimerFilter {
    keywords: Vec<String>,
    patterns: Vec<Regex>,
    block_start: Vec<Regex>,
    block_end: Vec<Regex>,
    threshold: usize,
}

impl DisclaimerFilter {
    pub fn new(lexicon: &Lexicon, settings: &CleanerSettings) -> Self {
        Self {
            keywords: lexicon.disclaimer_keywords.clone(),
            patterns: lexicon.disclaimer_patterns.clone(),
            block_start: lexicon.block_start.clone(),
            block_end: lexicon.block_end.clone(),
            threshold: settings.disclaimer_threshold,
        }
    }

    /// Distinct disclaimer keywords present in `block`.
    pub fn keyword_hits(&self, block: &str) -> Vec<String> {
        let lower = block.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| lower.contains(k.as_str()))
            .cloned()
            .collect()
    }

    /// Remove start-marker .. end-marker spans from the whole text.
    ///
    /// A start marker with no end marker after it is left in place and the
    /// search moves past it. At most `MAX_DISCLAIMER_PASSES` markers are
    /// examined.
    pub fn strip_blocks(&self, text: &str) -> Stripped {
        let mut text = text.to_string();
        let mut regions = Vec::new();
        let mut from = 0;

        for _ in 0..MAX_DISCLAIMER_PASSES {
            let Some((start, marker_end)) = self.next_start(&text, from) else {
                break;
            };
            match self.block_end(&text, marker_end) {
                Some(end) => {
                    regions.push(text[start..end].to_string());
                    text.replace_range(start..end, "");
                    from = start;
                }
                None => {
                    debug!(at = start, "Disclaimer start marker without end marker, left in place");
                    from = marker_end;
                }
            }
        }

        Stripped { text, regions }
    }

    fn next_start(&self, text: &str, from: usize) -> Option<(usize, usize)> {
        self.block_start
            .iter()
            .filter_map(|p| p.find_at(text, from))
            .min_by_key(|m| m.start())
            .map(|m| (m.start(), m.end()))
    }

    /// End of the sentence following the earliest end marker.
    fn block_end(&self, text: &str, from: usize) -> Option<usize> {
        let marker = self
            .block_end
            .iter()
            .filter_map(|p| p.find_at(text, from))
            .min_by_key(|m| m.start())?;
        let end = marker.end();

        let window_end = text[end..]
            .char_indices()
            .nth(200)
            .map(|(i, _)| end + i)
            .unwrap_or(text.len());
        let sentence_end = text[end..window_end]
            .find(|c| c == '.' || c == '\n')
            .map(|i| end + i + 1)
            .unwrap_or(end);
        Some(sentence_end)
    }
}

impl BlockFilter for DisclaimerFilter {
    fn name(&self) -> &'static str {
        "disclaimer"
    }

    fn category(&self) -> AuditCategory {
        AuditCategory::Disclaimer
    }

    fn inspect(&self, block: &str) -> Option<Vec<String>> {
        let hits = self.keyword_hits(block);
        if hits.len() >= self.threshold {
            return Some(hits);
        }
        self.patterns
            .iter()
            .find_map(|p| p.find(block))
            .map(|m| vec![m.as_str().to_string()])
    }
}

/// Blocks dominated by CJK text, unless they carry business content.
#[derive(Debug, Clone)]
pub struct ChineseFilter {
    ratio: f64,
    protection: ProtectionClassifier,
}

impl ChineseFilter {
    pub fn new(protection: ProtectionClassifier, settings: &CleanerSettings) -> Self {
        Self {
            ratio: settings.chinese_ratio,
            protection,
        }
    }

    pub fn cjk_ratio(block: &str) -> f64 {
        let mut cjk = 0usize;
        let mut total = 0usize;
        for c in block.chars().filter(|c| !c.is_whitespace()) {
            total += 1;
            if ('\u{4E00}'..='\u{9FFF}').contains(&c) {
                cjk += 1;
            }
        }
        if total == 0 {
            0.0
        } else {
            cjk as f64 / total as f64
        }
    }
}

impl BlockFilter for ChineseFilter {
    fn name(&self) -> &'static str {
        "chinese"
    }

    fn category(&self) -> AuditCategory {
        AuditCategory::Disclaimer
    }

    fn inspect(&self, block: &str) -> Option<Vec<String>> {
        if self.protection.is_protected(block) {
            return None;
        }
        (Self::cjk_ratio(block) > self.ratio).then(Vec::new)
    }
}

// ---------------------------------------------------------------------------
// Forwarded duplicates
// ---------------------------------------------------------------------------

/// First-occurrence-wins deduplication for one document.
#[derive(Debug, Clone)]
pub struct DuplicateTracker {
    seen: HashSet<String>,
    min_chars: usize,
}

impl DuplicateTracker {
    pub fn new(min_chars: usize) -> Self {
        Self {
            seen: HashSet::new(),
            min_chars,
        }
    }

    /// Records `block` and reports whether it was already seen.
    pub fn is_duplicate(&mut self, block: &str) -> bool {
        let normalized = block
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if normalized.chars().count() < self.min_chars {
            return false;
        }
        !self.seen.insert(normalized)
    }
}

// ---------------------------------------------------------------------------
// Line-level noise
// ---------------------------------------------------------------------------

/// Closing salutation plus the short contact lines under it.
#[derive(Debug, Clone)]
pub struct SignatureFilter {
    salutations: Vec<String>,
    lookahead: usize,
}

impl SignatureFilter {
    pub fn new(lexicon: &Lexicon, settings: &CleanerSettings) -> Self {
        Self {
            salutations: lexicon.salutations.clone(),
            lookahead: settings.signature_lookahead,
        }
    }

    fn is_salutation(&self, line: &str) -> bool {
        let token = line
            .trim()
            .trim_end_matches(|c| matches!(c, ',' | '.' | '!'))
            .to_lowercase();
        self.salutations.iter().any(|s| *s == token)
    }
}

impl TextFilter for SignatureFilter {
    fn name(&self) -> &'static str {
        "signature"
    }

    fn category(&self) -> AuditCategory {
        AuditCategory::Noise
    }

    fn strip(&self, text: &str) -> Stripped {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut kept = Vec::new();
        let mut regions = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            if !self.is_salutation(lines[i]) {
                kept.push(lines[i]);
                i += 1;
                continue;
            }

            let mut region = vec![lines[i].trim()];
            let mut inspected = 0;
            let mut j = i + 1;
            while j < lines.len() && inspected < self.lookahead {
                let t = lines[j].trim();
                if t.is_empty() {
                    kept.push(lines[j]);
                    j += 1;
                    continue;
                }
                if t.chars().count() < 50 || PHONE_RE.is_match(t) {
                    region.push(t);
                    inspected += 1;
                    j += 1;
                } else {
                    break;
                }
            }
            regions.push(region.join("\n"));
            i = j;
        }

        Stripped {
            text: kept.join("\n"),
            regions,
        }
    }
}

/// Image placeholders, bare links, separators, extraction artifacts.
#[derive(Debug, Clone)]
pub struct LineNoiseFilter {
    patterns: Vec<Regex>,
}

impl LineNoiseFilter {
    pub fn new(lexicon: &Lexicon) -> Self {
        Self {
            patterns: lexicon.noise_lines.clone(),
        }
    }
}

impl TextFilter for LineNoiseFilter {
    fn name(&self) -> &'static str {
        "line_noise"
    }

    fn category(&self) -> AuditCategory {
        AuditCategory::Noise
    }

    fn strip(&self, text: &str) -> Stripped {
        let mut kept = Vec::new();
        let mut regions = Vec::new();
        for line in text.split('\n') {
            let t = line.trim();
            if !t.is_empty() && self.patterns.iter().any(|p| p.is_match(t)) {
                regions.push(t.to_string());
            } else {
                kept.push(line);
            }
        }
        Stripped {
            text: kept.join("\n"),
            regions,
        }
    }
}
