// src/lexicon.rs

use crate::error::{Result, SchemeError};
use regex::Regex;
use serde::Deserialize;
use std::{fs, path::Path};
use tracing::info;

/// Keyword data shipped with the binary.
const BUILTIN_LEXICON: &str = include_str!("../data/lexicon.toml");

/// Keyword groups for the deterministic scheme classifier.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemeKeywords {
    pub one_off: Vec<String>,
    pub buy_side_pdc: Vec<String>,
    pub periodic_claim: Vec<String>,
    pub bank_offer: Vec<String>,
    pub coupon: Vec<String>,
    pub super_coin: Vec<String>,
    pub prexo: Vec<String>,
    pub puc_fdc: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPatterns {
    patterns: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDisclaimer {
    keywords: Vec<String>,
    patterns: Vec<String>,
    block_start: Vec<String>,
    block_end: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHeader {
    line_patterns: Vec<String>,
    markers: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNoise {
    line_patterns: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSignature {
    salutations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawLexicon {
    version: u32,
    #[serde(default)]
    protection: RawPatterns,
    #[serde(default)]
    disclaimer: RawDisclaimer,
    #[serde(default)]
    header: RawHeader,
    #[serde(default)]
    footer: RawPatterns,
    #[serde(default)]
    noise: RawNoise,
    #[serde(default)]
    signature: RawSignature,
    #[serde(default)]
    scheme: SchemeKeywords,
}

/// Compiled keyword and pattern tables.
///
/// Everything the cleaner and classifier match against that is data rather
/// than structure lives here, so the lists can grow without touching the
/// pipeline code.
#[derive(Debug, Clone)]
pub struct Lexicon {
    pub version: u32,
    pub protected: Vec<Regex>,
    pub disclaimer_keywords: Vec<String>,
    pub disclaimer_patterns: Vec<Regex>,
    pub block_start: Vec<Regex>,
    pub block_end: Vec<Regex>,
    pub header_lines: Vec<Regex>,
    pub header_markers: Vec<Regex>,
    pub footer: Vec<Regex>,
    pub noise_lines: Vec<Regex>,
    pub salutations: Vec<String>,
    pub scheme: SchemeKeywords,
}

impl Lexicon {
    /// The lexicon embedded at build time.
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_LEXICON)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let lexicon = Self::from_toml(&content)?;
        info!(
            path = %path.as_ref().display(),
            version = lexicon.version,
            "Loaded external lexicon"
        );
        Ok(lexicon)
    }

    /// Use `path` when given, the embedded lexicon otherwise.
    pub fn load_or_builtin(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawLexicon = toml::from_str(content)?;
        if raw.version == 0 {
            return Err(SchemeError::Lexicon("version must be at least 1".into()));
        }

        Ok(Self {
            version: raw.version,
            protected: compile(&raw.protection.patterns)?,
            disclaimer_keywords: lowercase(raw.disclaimer.keywords),
            disclaimer_patterns: compile(&raw.disclaimer.patterns)?,
            block_start: compile(&raw.disclaimer.block_start)?,
            block_end: compile(&raw.disclaimer.block_end)?,
            header_lines: compile(&raw.header.line_patterns)?,
            header_markers: compile(&raw.header.markers)?,
            footer: compile(&raw.footer.patterns)?,
            noise_lines: compile(&raw.noise.line_patterns)?,
            salutations: lowercase(raw.signature.salutations),
            scheme: SchemeKeywords {
                one_off: lowercase(raw.scheme.one_off),
                buy_side_pdc: lowercase(raw.scheme.buy_side_pdc),
                periodic_claim: lowercase(raw.scheme.periodic_claim),
                bank_offer: lowercase(raw.scheme.bank_offer),
                coupon: lowercase(raw.scheme.coupon),
                super_coin: lowercase(raw.scheme.super_coin),
                prexo: lowercase(raw.scheme.prexo),
                puc_fdc: lowercase(raw.scheme.puc_fdc),
            },
        })
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|source| SchemeError::Pattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

fn lowercase(words: Vec<String>) -> Vec<String> {
    words
        .into_iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_compiles() {
        let lex = Lexicon::builtin().unwrap();
        assert_eq!(lex.version, 1);
        assert!(!lex.protected.is_empty());
        assert!(!lex.block_start.is_empty());
        assert!(!lex.block_end.is_empty());
        assert!(lex.salutations.contains(&"best regards".to_string()));
        assert!(lex.scheme.coupon.contains(&"coupon".to_string()));
    }

    #[test]
    fn test_partial_lexicon_defaults_missing_sections() {
        let lex = Lexicon::from_toml(
            r#"
            version = 2
            [scheme]
            coupon = ["  Promo Code "]
            "#,
        )
        .unwrap();
        assert_eq!(lex.version, 2);
        assert!(lex.protected.is_empty());
        assert_eq!(lex.scheme.coupon, vec!["promo code".to_string()]);
    }

    #[test]
    fn test_invalid_pattern_names_entry() {
        let err = Lexicon::from_toml(
            r#"
            version = 1
            [footer]
            patterns = ['(unclosed']
            "#,
        )
        .unwrap_err();
        match err {
            SchemeError::Pattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_version_rejected() {
        assert!(Lexicon::from_toml("version = 0").is_err());
    }
}
