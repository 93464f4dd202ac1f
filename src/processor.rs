// src/processor.rs

use crate::classifier::{KeywordClassification, SchemeClassifier};
use crate::cleaner::{CleaningPipeline, CleaningResult, CleaningStats, cleaning_stats};
use crate::config::Config;
use crate::config_gen::{ConfigOutput, generate_config};
use crate::document::DocumentInput;
use crate::error::Result;
use crate::lexicon::Lexicon;
use crate::llm_extract::{ChatFieldSource, ExtractionInput, FieldSource};
use crate::mapping::{Enrichment, MappingStore};
use crate::scheme::{SchemeClassification, SchemeField, SchemeFields, SchemeSubtype, SchemeType};
use serde::Serialize;
use tracing::{Instrument, info, info_span, warn};

/// Which path decided the final (type, subtype).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Llm,
    Keywords,
}

/// Everything produced for one document.
#[derive(Debug, Clone, Serialize)]
pub struct SchemeOutcome {
    pub cleaning: CleaningResult,
    pub stats: CleaningStats,
    pub keyword: KeywordClassification,
    pub classification: SchemeClassification,
    pub classification_source: ClassificationSource,
    pub reasoning: String,
    pub fields: SchemeFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
    pub config: ConfigOutput,
}

/// Clean, extract, classify, enrich and generate config for a document.
pub struct SchemeProcessor {
    cleaner: CleaningPipeline,
    classifier: SchemeClassifier,
    mapping: Option<MappingStore>,
    source: Option<Box<dyn FieldSource>>,
}

impl SchemeProcessor {
    /// Keyword-only processor without mapping data.
    pub fn new(lexicon: &Lexicon, cfg: &Config) -> Result<Self> {
        Ok(Self {
            cleaner: CleaningPipeline::new(lexicon, &cfg.cleaner),
            classifier: SchemeClassifier::from_lexicon(lexicon)?,
            mapping: None,
            source: None,
        })
    }

    /// Lexicon and mapping table as configured, no LLM.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let lexicon = Lexicon::load_or_builtin(cfg.lexicon_path.as_deref())?;
        let mut processor = Self::new(&lexicon, cfg)?;
        processor.mapping = MappingStore::load_optional(cfg.mapping.path.as_deref())?;
        Ok(processor)
    }

    /// [`Self::from_config`] plus the configured LLM backend. An unreachable
    /// backend is logged and the processor stays keyword-only.
    pub async fn connect(cfg: &Config) -> Result<Self> {
        let processor = Self::from_config(cfg)?;
        let Some(chat) = ChatFieldSource::from_config(&cfg.llm)? else {
            info!("Keyword backend selected, LLM extraction disabled");
            return Ok(processor);
        };
        match chat.ensure_ready().await {
            Ok(()) => Ok(processor.with_source(Box::new(chat))),
            Err(e) => {
                warn!(error = %e, "LLM backend unavailable, continuing with keywords only");
                Ok(processor)
            }
        }
    }

    pub fn with_source(mut self, source: Box<dyn FieldSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_mapping(mut self, mapping: MappingStore) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn cleaner(&self) -> &CleaningPipeline {
        &self.cleaner
    }

    /// Keyword classification of the cleaned email with table and sheet texts.
    /// Absent texts are skipped rather than replaced by placeholders.
    pub fn classify_keywords(
        &self,
        cleaned_email: &str,
        table_text: Option<&str>,
        sheet_text: Option<&str>,
    ) -> KeywordClassification {
        let text = [Some(cleaned_email), table_text, sheet_text]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n\n");
        self.classifier.classify(&text)
    }

    /// What the extractor would be sent for `doc`, without calling it.
    pub fn context(&self, doc: &DocumentInput) -> ExtractionInput {
        let cleaning = self.cleaner.run(&doc.email_text);
        ExtractionInput::new(
            &cleaning.cleaned_text,
            doc.table_text.as_deref(),
            doc.sheet_text.as_deref(),
        )
    }

    pub async fn process(&self, doc: &DocumentInput) -> SchemeOutcome {
        self.process_text(
            &doc.email_text,
            doc.table_text.as_deref(),
            doc.sheet_text.as_deref(),
        )
        .await
    }

    /// Never fails: extractor errors fall back to keyword classification and
    /// unsupported pairs come back as an error-tagged config.
    pub async fn process_text(
        &self,
        email_text: &str,
        table_text: Option<&str>,
        sheet_text: Option<&str>,
    ) -> SchemeOutcome {
        let (cleaning, stats, keyword) = {
            let span = info_span!("process", email_chars = email_text.len());
            let _guard = span.enter();

            let cleaning = self.cleaner.run(email_text);
            let stats = cleaning_stats(email_text, &cleaning.cleaned_text);
            info!(
                original = stats.original_length,
                cleaned = stats.cleaned_length,
                reduction = stats.reduction_percent,
                "Cleaned email text"
            );

            let keyword = self.classify_keywords(&cleaning.cleaned_text, table_text, sheet_text);
            (cleaning, stats, keyword)
        };

        let input = ExtractionInput::new(&cleaning.cleaned_text, table_text, sheet_text);
        let extracted = match &self.source {
            Some(source) => match source
                .extract(&input)
                .instrument(info_span!("extract", source = source.name()))
                .await
            {
                Ok(fields) => Some(fields),
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Extraction failed, using keyword classification");
                    None
                }
            },
            None => None,
        };

        let (mut fields, classification, classification_source, reasoning) =
            reconcile(extracted, &keyword);
        info!(
            classification = %classification,
            source = ?classification_source,
            "Classified scheme"
        );

        fields.apply_classification_rules();

        let mut enrichment = None;
        if let Some(mapping) = &self.mapping {
            let fsns = mapping.resolve_fsns(
                fields.get(SchemeField::ModelName),
                fields.raw(SchemeField::FsnList).unwrap_or(""),
            );
            fields.set_resolved_fsns(fsns);

            if classification.scheme_type == SchemeType::SellSide
                && classification.subtype == SchemeSubtype::Ls
            {
                enrichment = mapping.ls_enrichment(fields.get(SchemeField::VendorName));
            }
        }

        let config = generate_config(&fields, enrichment.as_ref());
        if let ConfigOutput::Error { error } = &config {
            warn!(error = %error, "Config generation returned an error");
        }

        SchemeOutcome {
            cleaning,
            stats,
            keyword,
            classification,
            classification_source,
            reasoning,
            fields,
            enrichment,
            config,
        }
    }
}

/// The extractor's pair when it names a valid one, else the keyword pair.
fn reconcile(
    extracted: Option<SchemeFields>,
    keyword: &KeywordClassification,
) -> (SchemeFields, SchemeClassification, ClassificationSource, String) {
    let Some(mut fields) = extracted else {
        let mut fields = SchemeFields::new();
        fields.set_classification(keyword.classification);
        return (
            fields,
            keyword.classification,
            ClassificationSource::Keywords,
            keyword.reasoning.clone(),
        );
    };

    if fields.raw(SchemeField::SchemeType).is_some() {
        match fields.classification() {
            Ok(c) => {
                fields.set_classification(c);
                let reasoning = if c == keyword.classification {
                    format!("LLM classified as {c}; keyword classifier agrees")
                } else {
                    format!(
                        "LLM classified as {c}; keyword classifier suggested {}",
                        keyword.classification
                    )
                };
                return (fields, c, ClassificationSource::Llm, reasoning);
            }
            Err(e) => warn!(error = %e, "LLM classification outside taxonomy"),
        }
    }

    fields.set_classification(keyword.classification);
    let reasoning = format!("LLM gave no valid classification. {}", keyword.reasoning);
    (
        fields,
        keyword.classification,
        ClassificationSource::Keywords,
        reasoning,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_gen::ConfigType;
    use crate::error::SchemeError;
    use async_trait::async_trait;

    struct StubSource(Vec<(SchemeField, &'static str)>);

    #[async_trait]
    impl FieldSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        async fn extract(&self, _input: &ExtractionInput) -> Result<SchemeFields> {
            Ok(self.0.iter().map(|(f, v)| (*f, *v)).collect())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl FieldSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn extract(&self, _input: &ExtractionInput) -> Result<SchemeFields> {
            Err(SchemeError::Llm("connection refused".into()))
        }
    }

    const EMAIL: &str = "Cc: a@x.com, b@x.com\nHi team, please find attached the scheme details for the coupon offer.";

    fn processor() -> SchemeProcessor {
        SchemeProcessor::new(&Lexicon::builtin().unwrap(), &Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_keyword_only() {
        let out = processor().process_text(EMAIL, None, None).await;
        assert!(!out.cleaning.cleaned_text.contains("Cc:"));
        assert_eq!(out.classification_source, ClassificationSource::Keywords);
        assert_eq!(out.classification.subtype, SchemeSubtype::Cp);
        assert_eq!(out.fields.get(SchemeField::SchemeSubtype), "CP");
        assert_eq!(out.config.config_type(), Some(ConfigType::SsCp));
    }

    #[tokio::test]
    async fn test_llm_pair_wins() {
        let source = StubSource(vec![
            (SchemeField::SchemeType, "buy side"),
            (SchemeField::SchemeSubtype, "PERIODIC_CLAIM"),
            (SchemeField::BestBet, "5% extra"),
            (SchemeField::GstRate, "18"),
        ]);
        let out = processor()
            .with_source(Box::new(source))
            .process_text(EMAIL, None, None)
            .await;

        assert_eq!(out.classification_source, ClassificationSource::Llm);
        assert_eq!(out.classification.scheme_type, SchemeType::BuySide);
        assert_eq!(out.fields.get(SchemeField::SchemeType), "BUY_SIDE");
        assert!(out.reasoning.contains("keyword classifier suggested SELL_SIDE → CP"));
        // rules keep periodic-claim fields, drop one-off ones
        assert_eq!(out.fields.raw(SchemeField::BestBet), Some("5% extra"));
        assert_eq!(out.fields.raw(SchemeField::GstRate), None);
        assert_eq!(out.config.config_type(), Some(ConfigType::BsPc));
    }

    #[tokio::test]
    async fn test_invalid_llm_pair_uses_keywords() {
        let source = StubSource(vec![
            (SchemeField::SchemeType, "SELL_SIDE"),
            (SchemeField::SchemeSubtype, "ZZZ"),
            (SchemeField::VendorName, "Acme"),
        ]);
        let out = processor()
            .with_source(Box::new(source))
            .process_text(EMAIL, None, None)
            .await;

        assert_eq!(out.classification_source, ClassificationSource::Keywords);
        assert_eq!(out.classification.subtype, SchemeSubtype::Cp);
        assert_eq!(out.fields.raw(SchemeField::VendorName), Some("Acme"));
        assert!(out.reasoning.starts_with("LLM gave no valid classification"));
        assert!(!out.config.is_error());
    }

    #[tokio::test]
    async fn test_extractor_failure_falls_back() {
        let out = processor()
            .with_source(Box::new(FailingSource))
            .process_text(EMAIL, None, None)
            .await;
        assert_eq!(out.classification_source, ClassificationSource::Keywords);
        assert_eq!(out.config.config_type(), Some(ConfigType::SsCp));
    }

    #[tokio::test]
    async fn test_table_text_feeds_keywords() {
        let out = processor()
            .process_text("Hello team", Some("Model,Exchange offer\nX1,500"), None)
            .await;
        assert_eq!(out.classification.subtype, SchemeSubtype::Prx);
    }

    #[tokio::test]
    async fn test_lifestyle_enrichment() {
        let mapping = MappingStore::from_toml(
            r#"
            [[product]]
            fsn = "TSHGX2F3HZQ8KJYP"
            model_name = "Classic Tee"

            [[brand]]
            brand = "Indo Era"
            margin = "0.37"
            dmrp_details = "DMRP is 40%"
            "#,
        )
        .unwrap();
        let source = StubSource(vec![
            (SchemeField::SchemeType, "SELL_SIDE"),
            (SchemeField::SchemeSubtype, "LS"),
            (SchemeField::VendorName, "IndoEra"),
            (SchemeField::ModelName, "classic tee"),
        ]);
        let out = processor()
            .with_source(Box::new(source))
            .with_mapping(mapping)
            .process_text(EMAIL, None, None)
            .await;

        assert_eq!(out.fields.resolved_fsns(), ["TSHGX2F3HZQ8KJYP".to_string()]);
        let enrichment = out.enrichment.as_ref().unwrap();
        assert_eq!(enrichment.margin, "37");
        assert_eq!(out.config.config_type(), Some(ConfigType::SsLs));
        let json = out.config.to_json();
        assert_eq!(json["fields"]["ProductId"], "TSHGX2F3HZQ8KJYP");
    }

    #[test]
    fn test_context_matches_extractor_input() {
        let doc = DocumentInput {
            path: "offer.txt".into(),
            kind: crate::document::SourceKind::Text,
            email_text: EMAIL.to_string(),
            table_text: Some("Model,Support\nX1,500".to_string()),
            sheet_text: None,
        };
        let input = processor().context(&doc);
        assert!(!input.email_text.contains("Cc:"));
        assert!(input.email_text.contains("coupon offer"));
        assert_eq!(input.table_text, "Model,Support\nX1,500");
        assert_eq!(input.sheet_text, crate::llm_extract::NO_SHEET_DATA);
    }

    #[tokio::test]
    async fn test_empty_document() {
        let out = processor().process_text("", None, None).await;
        assert!(out.cleaning.cleaned_text.is_empty());
        assert_eq!(out.stats.reduction_percent, 0.0);
        assert_eq!(out.config.config_type(), Some(ConfigType::SsPuc));
    }
}
