use crate::error::{Result, SchemeError};
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// External keyword data; the embedded lexicon is used when unset.
    #[serde(default)]
    pub lexicon_path: Option<String>,
    #[serde(default)]
    pub cleaner: CleanerSettings,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub mapping: MappingSection,
}

fn default_db_path() -> String {
    "schemes/schemes.db".to_string()
}

fn default_output_dir() -> String {
    "outputs".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            output_dir: default_output_dir(),
            lexicon_path: None,
            cleaner: CleanerSettings::default(),
            llm: LlmSection::default(),
            mapping: MappingSection::default(),
        }
    }
}

/// Tunables for the cleaning pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanerSettings {
    /// Distinct disclaimer keywords needed before a paragraph counts as a disclaimer.
    pub disclaimer_threshold: usize,
    /// Share of CJK characters above which an unprotected block is dropped.
    pub chinese_ratio: f64,
    /// Normalized length below which paragraphs are never deduplicated.
    pub dedup_min_chars: usize,
    /// Non-empty lines inspected after a closing salutation.
    pub signature_lookahead: usize,
    /// Characters kept in audit previews.
    pub preview_chars: usize,
}

impl Default for CleanerSettings {
    fn default() -> Self {
        Self {
            disclaimer_threshold: 3,
            chinese_ratio: 0.3,
            dedup_min_chars: 50,
            signature_lookahead: 6,
            preview_chars: 80,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// No LLM call; only the keyword classifier fills the field bag.
    Keywords,
    Ollama,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub backend: LlmBackend,
    pub temperature: f64,
    pub max_tokens: u32,
    pub max_input_chars: usize,
    pub ollama: EndpointSection,
    pub remote: EndpointSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Keywords,
            temperature: 0.1,
            max_tokens: 4000,
            max_input_chars: 12_000,
            ollama: EndpointSection {
                base_url: "http://localhost:11434/v1".to_string(),
                model: "qwen3:8b".to_string(),
                api_key_env: None,
            },
            remote: EndpointSection {
                base_url: "https://openrouter.ai/api/v1".to_string(),
                model: "qwen/qwen3-32b".to_string(),
                api_key_env: Some("OPENROUTER_API_KEY".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSection {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MappingSection {
    /// TOML table of FSN and brand rows used for enrichment.
    pub path: Option<String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !(0.0..=1.0).contains(&self.llm.temperature) {
            errors.push(format!(
                "llm.temperature must be between 0 and 1, got {}",
                self.llm.temperature
            ));
        }
        if self.llm.max_tokens < 100 {
            errors.push(format!("llm.max_tokens too low: {}", self.llm.max_tokens));
        }
        if self.cleaner.disclaimer_threshold == 0 {
            errors.push("cleaner.disclaimer_threshold must be at least 1".to_string());
        }
        if !(self.cleaner.chinese_ratio > 0.0 && self.cleaner.chinese_ratio <= 1.0) {
            errors.push(format!(
                "cleaner.chinese_ratio must be in (0, 1], got {}",
                self.cleaner.chinese_ratio
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemeError::Config(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_valid() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.db_path, "schemes/schemes.db");
        assert_eq!(cfg.cleaner.disclaimer_threshold, 3);
        assert_eq!(cfg.llm.backend, LlmBackend::Keywords);
        assert!(cfg.mapping.path.is_none());
    }

    #[test]
    fn test_sections_override_defaults() {
        let cfg = Config::from_toml(
            r#"
            output_dir = "out"
            [cleaner]
            disclaimer_threshold = 2
            [llm]
            backend = "remote"
            temperature = 0.0
            [llm.remote]
            base_url = "https://example.test/v1"
            model = "m"
            api_key_env = "MY_KEY"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.output_dir, "out");
        assert_eq!(cfg.cleaner.disclaimer_threshold, 2);
        assert_eq!(cfg.cleaner.chinese_ratio, 0.3);
        assert_eq!(cfg.llm.backend, LlmBackend::Remote);
        assert_eq!(cfg.llm.remote.api_key_env.as_deref(), Some("MY_KEY"));
        assert_eq!(cfg.llm.ollama.model, "qwen3:8b");
    }

    #[test]
    fn test_validation_collects_errors() {
        let err = Config::from_toml(
            r#"
            [llm]
            temperature = 1.5
            max_tokens = 10
            "#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("temperature"));
        assert!(msg.contains("max_tokens"));
    }

    #[test]
    fn test_example_config_parses() {
        let cfg = Config::from_toml(include_str!("../data/scheme_extract.example.toml")).unwrap();
        assert_eq!(cfg.llm.backend, LlmBackend::Keywords);
        assert_eq!(cfg.mapping.path.as_deref(), Some("data/mapping.example.toml"));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut cfg = Config::default();
        cfg.cleaner.disclaimer_threshold = 0;
        assert!(cfg.validate().is_err());
    }
}
