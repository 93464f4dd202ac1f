// src/mapping.rs

use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{debug, info, warn};

static FSN_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;,\s]+").expect("static regex"));

static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("static regex"));

/// Minimum length of an FSN token taken from extracted text.
const MIN_FSN_LEN: usize = 10;

pub const DEFAULT_SITE_ID: &str = "National_Site";

#[derive(Debug, Clone, Deserialize)]
pub struct ProductRow {
    pub fsn: String,
    pub model_name: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrandRow {
    pub brand: String,
    #[serde(default)]
    pub margin: Option<String>,
    #[serde(default)]
    pub dmrp_details: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DmrpType {
    Percentage,
    Absolute,
}

impl DmrpType {
    pub fn code(self) -> &'static str {
        match self {
            DmrpType::Percentage => "PERCENTAGE",
            DmrpType::Absolute => "ABSOLUTE",
        }
    }
}

/// Brand-level values merged into lifestyle scheme configs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enrichment {
    pub margin: String,
    pub dmrp_type: DmrpType,
    pub dmrp_value: String,
    pub site_id: String,
}

/// Local product and brand lookup table, kept out of the LLM context.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingStore {
    #[serde(default, rename = "product")]
    products: Vec<ProductRow>,
    #[serde(default, rename = "brand")]
    brands: Vec<BrandRow>,
}

impl MappingStore {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let store = Self::from_toml(&content)?;
        info!(
            path = %path.as_ref().display(),
            products = store.products.len(),
            brands = store.brands.len(),
            "Loaded mapping table"
        );
        Ok(store)
    }

    /// A missing file is logged and treated as no mapping.
    pub fn load_optional(path: Option<&str>) -> Result<Option<Self>> {
        match path {
            Some(p) if Path::new(p).exists() => Self::load(p).map(Some),
            Some(p) => {
                warn!(path = %p, "Mapping file not found");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// FSNs from extracted text first, then model-name lookup.
    pub fn resolve_fsns(&self, model_name: &str, extracted: &str) -> Vec<String> {
        let from_text = parse_fsn_tokens(extracted);
        if !from_text.is_empty() {
            debug!(count = from_text.len(), "Using FSNs found in document text");
            return from_text;
        }

        let model = model_name.trim();
        let unusable = ["", "not specified", "n/a", "none"];
        if unusable.contains(&model.to_lowercase().as_str()) {
            return Vec::new();
        }

        let target = collapse(model);
        let exact = self.collect_fsns(|row| {
            collapse(&row.model_name) == target
                || row.title.as_deref().is_some_and(|t| collapse(t) == target)
        });
        if !exact.is_empty() {
            info!(model = %model, count = exact.len(), "Mapped model to FSNs");
            return exact;
        }

        let needle = model.to_lowercase();
        let partial = self.collect_fsns(|row| {
            row.model_name.to_lowercase().contains(&needle)
                || row
                    .title
                    .as_deref()
                    .is_some_and(|t| t.to_lowercase().contains(&needle))
        });
        if partial.is_empty() {
            warn!(model = %model, "No FSN match for model");
        } else {
            info!(model = %model, count = partial.len(), "Mapped model to FSNs by partial match");
        }
        partial
    }

    fn collect_fsns(&self, mut pred: impl FnMut(&ProductRow) -> bool) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for row in self.products.iter().filter(|r| pred(*r)) {
            let fsn = row.fsn.trim();
            if !fsn.is_empty() && !out.iter().any(|f| f == fsn) {
                out.push(fsn.to_string());
            }
        }
        out
    }

    /// Margin, DMRP and site for a brand, matched ignoring whitespace.
    pub fn ls_enrichment(&self, vendor_name: &str) -> Option<Enrichment> {
        let vendor = vendor_name.trim();
        let unusable = ["", "unknown vendor", "not specified", "unknown"];
        if unusable.contains(&vendor.to_lowercase().as_str()) {
            return None;
        }

        let target = collapse(vendor);
        let needle = vendor.to_lowercase();
        let row = self
            .brands
            .iter()
            .find(|b| collapse(&b.brand) == target)
            .or_else(|| {
                self.brands
                    .iter()
                    .find(|b| b.brand.to_lowercase().contains(&needle))
            });

        let Some(row) = row else {
            debug!(vendor = %vendor, "No brand mapping");
            return None;
        };

        let dmrp_raw = row.dmrp_details.as_deref().unwrap_or("");
        let enrichment = Enrichment {
            margin: clean_percentage(row.margin.as_deref().unwrap_or("")),
            dmrp_type: if dmrp_raw.contains('%') {
                DmrpType::Percentage
            } else {
                DmrpType::Absolute
            },
            dmrp_value: clean_percentage(dmrp_raw),
            site_id: row
                .site
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_SITE_ID)
                .to_string(),
        };
        info!(vendor = %vendor, brand = %row.brand, "Enriched lifestyle fields");
        Some(enrichment)
    }
}

fn parse_fsn_tokens(extracted: &str) -> Vec<String> {
    let extracted = extracted.trim();
    if extracted.is_empty() || extracted.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    FSN_SPLIT_RE
        .split(extracted)
        .map(str::trim)
        .filter(|t| t.chars().count() >= MIN_FSN_LEN)
        .map(str::to_string)
        .collect()
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<String>().to_lowercase()
}

/// `30%` → `30`, `0.37` → `37`, `DMRP is 40%` → `40`.
pub fn clean_percentage(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s == "-" {
        return "Not Specified".to_string();
    }

    if let Some(caps) = PERCENT_RE.captures(s) {
        let num = &caps[1];
        return match num.parse::<f64>() {
            Ok(v) if v.fract() == 0.0 => format!("{}", v as i64),
            _ => num.to_string(),
        };
    }

    match s.parse::<f64>() {
        Ok(v) if v > 0.0 && v < 1.0 => format!("{}", (v * 100.0).round() as i64),
        Ok(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Ok(v) => v.to_string(),
        Err(_) => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
        [[product]]
        fsn = "MOBGX2F3HZQ8KJYP"
        model_name = "Galaxy M14 5G"
        title = "Samsung Galaxy M14 5G (Blue, 128 GB)"

        [[product]]
        fsn = "MOBGX2F3JYH7TCKC"
        model_name = "Galaxy M14 5G"

        [[product]]
        fsn = "ACNGZ8YHQRTPDSWN"
        model_name = "WindFree AC 1.5T"

        [[brand]]
        brand = "Indo Era"
        margin = "0.37"
        dmrp_details = "DMRP is 40%"
        site = "Bangalore_Site"

        [[brand]]
        brand = "Campus Shoes"
        margin = "30%"
        dmrp_details = "500"
    "#;

    fn store() -> MappingStore {
        MappingStore::from_toml(TABLE).unwrap()
    }

    #[test]
    fn test_extracted_fsns_win() {
        let fsns = store().resolve_fsns("Galaxy M14 5G", "ABCDEFGHIJ12; short, XYZXYZXYZ123");
        assert_eq!(fsns, vec!["ABCDEFGHIJ12", "XYZXYZXYZ123"]);
    }

    #[test]
    fn test_model_lookup_ignores_whitespace() {
        let fsns = store().resolve_fsns("galaxym14 5g", "None");
        assert_eq!(fsns, vec!["MOBGX2F3HZQ8KJYP", "MOBGX2F3JYH7TCKC"]);
    }

    #[test]
    fn test_model_lookup_partial() {
        let fsns = store().resolve_fsns("WindFree", "");
        assert_eq!(fsns, vec!["ACNGZ8YHQRTPDSWN"]);
        assert!(store().resolve_fsns("Not Specified", "").is_empty());
        assert!(store().resolve_fsns("Pixel 9", "").is_empty());
    }

    #[test]
    fn test_ls_enrichment() {
        let e = store().ls_enrichment("IndoEra").unwrap();
        assert_eq!(e.margin, "37");
        assert_eq!(e.dmrp_type, DmrpType::Percentage);
        assert_eq!(e.dmrp_value, "40");
        assert_eq!(e.site_id, "Bangalore_Site");

        let e = store().ls_enrichment("campus").unwrap();
        assert_eq!(e.margin, "30");
        assert_eq!(e.dmrp_type, DmrpType::Absolute);
        assert_eq!(e.dmrp_value, "500");
        assert_eq!(e.site_id, DEFAULT_SITE_ID);

        assert!(store().ls_enrichment("Unknown Vendor").is_none());
        assert!(store().ls_enrichment("Nobody").is_none());
    }

    #[test]
    fn test_example_table_parses() {
        let store = MappingStore::from_toml(include_str!("../data/mapping.example.toml")).unwrap();
        assert_eq!(store.resolve_fsns("WindFree AC 1.5T", ""), vec!["ACNGZ8YHQRTPDSWN"]);
        assert!(store.ls_enrichment("Campus Shoes").is_some());
    }

    #[test]
    fn test_clean_percentage() {
        assert_eq!(clean_percentage("30%"), "30");
        assert_eq!(clean_percentage("12.5 %"), "12.5");
        assert_eq!(clean_percentage("0.37"), "37");
        assert_eq!(clean_percentage("15"), "15");
        assert_eq!(clean_percentage("2.5"), "2.5");
        assert_eq!(clean_percentage("-"), "Not Specified");
        assert_eq!(clean_percentage("flat"), "flat");
    }
}
