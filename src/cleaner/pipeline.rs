// src/cleaner/pipeline.rs

use super::filters::{
    AddressBlockFilter, BlockFilter, CcBlockFilter, ChineseFilter, DisclaimerFilter,
    DuplicateTracker, FooterFilter, HeaderFilter, LineNoiseFilter, SignatureFilter, TextFilter,
    is_malformed,
};
use super::{
    AuditCategory, AuditEntry, BlockClass, CleaningResult, CleaningStats, ProtectionClassifier,
    cleaning_stats, normalize_text, segment,
};
use crate::config::{CleanerSettings, Config};
use crate::error::Result;
use crate::lexicon::Lexicon;
use tracing::{debug, info, info_span};

/// Deterministic noise removal for extracted email and PDF text.
///
/// Stages run in a fixed order: normalize, line-adjacency address blocks,
/// disclaimer spans, segmentation, protection, paragraph filters,
/// reassembly. Protected and table paragraphs never reach a filter.
#[derive(Debug, Clone)]
pub struct CleaningPipeline {
    settings: CleanerSettings,
    protection: ProtectionClassifier,
    cc: CcBlockFilter,
    address: AddressBlockFilter,
    header: HeaderFilter,
    footer: FooterFilter,
    disclaimer: DisclaimerFilter,
    chinese: ChineseFilter,
    signature: SignatureFilter,
    line_noise: LineNoiseFilter,
    last: CleaningResult,
}

impl CleaningPipeline {
    pub fn new(lexicon: &Lexicon, settings: &CleanerSettings) -> Self {
        let protection = ProtectionClassifier::new(lexicon);
        Self {
            settings: settings.clone(),
            cc: CcBlockFilter,
            address: AddressBlockFilter,
            header: HeaderFilter::new(lexicon),
            footer: FooterFilter::new(lexicon),
            disclaimer: DisclaimerFilter::new(lexicon, settings),
            chinese: ChineseFilter::new(protection.clone(), settings),
            signature: SignatureFilter::new(lexicon, settings),
            line_noise: LineNoiseFilter::new(lexicon),
            protection,
            last: CleaningResult::default(),
        }
    }

    /// Embedded lexicon with default settings.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(&Lexicon::builtin()?, &CleanerSettings::default()))
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let lexicon = Lexicon::load_or_builtin(cfg.lexicon_path.as_deref())?;
        Ok(Self::new(&lexicon, &cfg.cleaner))
    }

    /// Clean `raw` and keep the audit trail for [`Self::audit_summary`].
    pub fn clean(&mut self, raw: &str) -> String {
        let result = self.run(raw);
        let text = result.cleaned_text.clone();
        self.last = result;
        text
    }

    /// Audit trail of the most recent [`Self::clean`] call.
    pub fn audit_summary(&self) -> &CleaningResult {
        &self.last
    }

    pub fn cleaning_stats(&self, original: &str, cleaned: &str) -> CleaningStats {
        cleaning_stats(original, cleaned)
    }

    /// One full pass over `raw`. Does not touch the stored audit trail.
    pub fn run(&self, raw: &str) -> CleaningResult {
        let span = info_span!("clean", input_chars = raw.len());
        let _guard = span.enter();

        let mut result = CleaningResult::default();
        let mut text = normalize_text(raw);

        for filter in [&self.cc as &dyn TextFilter, &self.address] {
            let stripped = filter.strip(&text);
            self.record_fragments(&mut result, filter.category(), &stripped.regions);
            text = stripped.text;
        }

        let stripped = self.disclaimer.strip_blocks(&text);
        self.record_fragments(&mut result, AuditCategory::Disclaimer, &stripped.regions);
        text = stripped.text;

        let blocks = segment(&text);
        result.paragraphs = blocks.len();

        let mut protected = Vec::new();
        let mut cleanable = Vec::new();
        let mut duplicates = DuplicateTracker::new(self.settings.dedup_min_chars);

        for block in &blocks {
            let content = block.content();
            match self.protection.classify(content) {
                BlockClass::Table => {
                    result.tables_protected += 1;
                    result.retained += 1;
                    protected.push(content.to_string());
                }
                BlockClass::Protected => {
                    result.protected += 1;
                    result.retained += 1;
                    protected.push(content.to_string());
                }
                BlockClass::Cleanable => {
                    match self.clean_block(content, &mut duplicates, &mut result) {
                        Some(kept) => {
                            result.retained += 1;
                            cleanable.push(kept);
                        }
                        None => result.removed += 1,
                    }
                }
            }
        }

        protected.extend(cleanable);
        result.cleaned_text = protected.join("\n\n");

        info!(
            paragraphs = result.paragraphs,
            retained = result.retained,
            removed = result.removed,
            protected = result.protected,
            tables = result.tables_protected,
            fragments = result.fragments_removed,
            "Cleaning complete"
        );
        result
    }

    /// Paragraph filters, then line filters, repeated until the line filters
    /// leave the block unchanged, then deduplication. `None` when the block
    /// is dropped.
    fn clean_block(
        &self,
        block: &str,
        duplicates: &mut DuplicateTracker,
        result: &mut CleaningResult,
    ) -> Option<String> {
        if is_malformed(block) {
            debug!("Malformed block retained");
            return Some(block.to_string());
        }

        let paragraph_filters: [&dyn BlockFilter; 4] =
            [&self.header, &self.footer, &self.disclaimer, &self.chinese];
        let line_filters: [&dyn TextFilter; 2] = [&self.signature, &self.line_noise];

        let mut text = block.trim().to_string();
        loop {
            for filter in paragraph_filters {
                if let Some(keywords) = filter.detect(&text) {
                    record(
                        result,
                        AuditEntry::new(filter.category(), &text, self.settings.preview_chars)
                            .with_keywords(keywords),
                    );
                    return None;
                }
            }

            let mut changed = false;
            for filter in line_filters {
                let stripped = filter.strip(&text);
                if !stripped.regions.is_empty() {
                    changed = true;
                    debug!(filter = filter.name(), lines = stripped.regions.len(), "Lines stripped");
                }
                self.record_fragments(result, filter.category(), &stripped.regions);
                text = stripped.text;
            }
            text = text.trim().to_string();

            if text.is_empty() {
                return None;
            }
            // What is left must look the same to a second pass over the output.
            if !changed || self.protection.classify(&text) != BlockClass::Cleanable {
                break;
            }
        }

        if duplicates.is_duplicate(&text) {
            record(
                result,
                AuditEntry::new(AuditCategory::Noise, &text, self.settings.preview_chars),
            );
            return None;
        }
        Some(text)
    }

    fn record_fragments(
        &self,
        result: &mut CleaningResult,
        category: AuditCategory,
        regions: &[String],
    ) {
        for region in regions {
            result.fragments_removed += 1;
            record(
                result,
                AuditEntry::new(category, region, self.settings.preview_chars),
            );
        }
    }
}

fn record(result: &mut CleaningResult, entry: AuditEntry) {
    debug!(category = ?entry.category, preview = %entry.preview, "Removed");
    result.entries.push(entry);
}
