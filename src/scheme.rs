// src/scheme.rs

use crate::error::{Result, SchemeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemeType {
    #[serde(rename = "BUY_SIDE")]
    BuySide,
    #[serde(rename = "SELL_SIDE")]
    SellSide,
    #[serde(rename = "ONE_OFF")]
    OneOff,
    #[serde(rename = "PDC")]
    Pdc,
}

impl SchemeType {
    pub fn code(self) -> &'static str {
        match self {
            SchemeType::BuySide => "BUY_SIDE",
            SchemeType::SellSide => "SELL_SIDE",
            SchemeType::OneOff => "ONE_OFF",
            SchemeType::Pdc => "PDC",
        }
    }

    /// Canonical code or one of the aliases used by extractors.
    pub fn parse(raw: &str) -> Option<Self> {
        match canonical(raw).as_str() {
            "BUY_SIDE" | "BUYSIDE" => Some(SchemeType::BuySide),
            "SELL_SIDE" | "SELLSIDE" => Some(SchemeType::SellSide),
            "ONE_OFF" | "ONEOFF" | "OFC" => Some(SchemeType::OneOff),
            "PDC" => Some(SchemeType::Pdc),
            _ => None,
        }
    }

    pub fn valid_subtypes(self) -> &'static [SchemeSubtype] {
        use SchemeSubtype::*;
        match self {
            SchemeType::BuySide => &[PeriodicClaim, Pdc],
            SchemeType::SellSide => &[Cp, Puc, Prx, Sc, Boc, Ls],
            SchemeType::OneOff => &[NotApplicable],
            SchemeType::Pdc => &[Pdc],
        }
    }
}

impl fmt::Display for SchemeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemeSubtype {
    #[serde(rename = "PERIODIC_CLAIM")]
    PeriodicClaim,
    #[serde(rename = "PDC")]
    Pdc,
    #[serde(rename = "CP")]
    Cp,
    #[serde(rename = "PUC")]
    Puc,
    #[serde(rename = "PRX")]
    Prx,
    #[serde(rename = "SC")]
    Sc,
    #[serde(rename = "BOC")]
    Boc,
    #[serde(rename = "LS")]
    Ls,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl SchemeSubtype {
    pub fn code(self) -> &'static str {
        match self {
            SchemeSubtype::PeriodicClaim => "PERIODIC_CLAIM",
            SchemeSubtype::Pdc => "PDC",
            SchemeSubtype::Cp => "CP",
            SchemeSubtype::Puc => "PUC",
            SchemeSubtype::Prx => "PRX",
            SchemeSubtype::Sc => "SC",
            SchemeSubtype::Boc => "BOC",
            SchemeSubtype::Ls => "LS",
            SchemeSubtype::NotApplicable => "N/A",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match canonical(raw).as_str() {
            "PERIODIC_CLAIM" | "PERIODICCLAIM" | "PC" => Some(SchemeSubtype::PeriodicClaim),
            "PDC" | "PRICE_DROP" => Some(SchemeSubtype::Pdc),
            "CP" | "COUPON" => Some(SchemeSubtype::Cp),
            "PUC" | "FDC" | "PUC/FDC" | "PUC_FDC" => Some(SchemeSubtype::Puc),
            "PRX" | "PREXO" => Some(SchemeSubtype::Prx),
            "SC" | "SUPER_COIN" | "SUPERCOIN" => Some(SchemeSubtype::Sc),
            "BOC" | "BANK_OFFER" => Some(SchemeSubtype::Boc),
            "LS" | "LIFESTYLE" => Some(SchemeSubtype::Ls),
            "N/A" | "NA" | "N_A" => Some(SchemeSubtype::NotApplicable),
            _ => None,
        }
    }
}

impl fmt::Display for SchemeSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Upper-case, spaces and hyphens folded to `_`.
fn canonical(raw: &str) -> String {
    raw.trim()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
}

/// A (type, subtype) pair that is always a member of the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchemeClassification {
    pub scheme_type: SchemeType,
    pub subtype: SchemeSubtype,
}

impl SchemeClassification {
    pub fn new(scheme_type: SchemeType, subtype: SchemeSubtype) -> Result<Self> {
        if scheme_type.valid_subtypes().contains(&subtype) {
            Ok(Self {
                scheme_type,
                subtype,
            })
        } else {
            Err(SchemeError::InvalidClassification {
                scheme_type: scheme_type.code().to_string(),
                subtype: subtype.code().to_string(),
            })
        }
    }

    /// Parse both codes; a missing subtype is accepted for ONE_OFF and PDC.
    pub fn parse(scheme_type: &str, subtype: &str) -> Result<Self> {
        let invalid = || SchemeError::InvalidClassification {
            scheme_type: scheme_type.to_string(),
            subtype: subtype.to_string(),
        };
        let t = SchemeType::parse(scheme_type).ok_or_else(invalid)?;
        let s = match SchemeSubtype::parse(subtype) {
            Some(s) => s,
            None if subtype.trim().is_empty() => match t {
                SchemeType::OneOff => SchemeSubtype::NotApplicable,
                SchemeType::Pdc => SchemeSubtype::Pdc,
                _ => return Err(invalid()),
            },
            None => return Err(invalid()),
        };
        Self::new(t, s).map_err(|_| invalid())
    }
}

impl fmt::Display for SchemeClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.scheme_type, self.subtype)
    }
}

// ---------------------------------------------------------------------------
// Field bag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeField {
    SchemeType,
    SchemeSubtype,
    SchemeName,
    SchemeDescription,
    SchemePeriod,
    Duration,
    DiscountType,
    MaxCap,
    VendorName,
    PriceDropDate,
    StartDate,
    EndDate,
    FsnFileConfigFile,
    MinActualDiscountOrAgreedClaim,
    RemoveGstFromFinalClaim,
    OverAndAbove,
    DiscountSlabType,
    BestBet,
    BrandSupportAbsolute,
    GstRate,
    ModelName,
    FsnList,
    ConfigBrandSupport,
    ConfigMaxQuantity,
    ConfigUnitSlabLower,
    ConfigUnitSlabUpper,
    ConfigMaxSupportValue,
    ConfigVendorSplitRatio,
    ConfigMargin,
    ConfigIncomingFsn,
    ConfigExchangeSlabFrom,
    ConfigExchangeSlabTo,
    ConfigAgreedSupport,
    ConfigBestBetQuantity,
}

impl SchemeField {
    pub const ALL: [SchemeField; 34] = [
        SchemeField::SchemeType,
        SchemeField::SchemeSubtype,
        SchemeField::SchemeName,
        SchemeField::SchemeDescription,
        SchemeField::SchemePeriod,
        SchemeField::Duration,
        SchemeField::DiscountType,
        SchemeField::MaxCap,
        SchemeField::VendorName,
        SchemeField::PriceDropDate,
        SchemeField::StartDate,
        SchemeField::EndDate,
        SchemeField::FsnFileConfigFile,
        SchemeField::MinActualDiscountOrAgreedClaim,
        SchemeField::RemoveGstFromFinalClaim,
        SchemeField::OverAndAbove,
        SchemeField::DiscountSlabType,
        SchemeField::BestBet,
        SchemeField::BrandSupportAbsolute,
        SchemeField::GstRate,
        SchemeField::ModelName,
        SchemeField::FsnList,
        SchemeField::ConfigBrandSupport,
        SchemeField::ConfigMaxQuantity,
        SchemeField::ConfigUnitSlabLower,
        SchemeField::ConfigUnitSlabUpper,
        SchemeField::ConfigMaxSupportValue,
        SchemeField::ConfigVendorSplitRatio,
        SchemeField::ConfigMargin,
        SchemeField::ConfigIncomingFsn,
        SchemeField::ConfigExchangeSlabFrom,
        SchemeField::ConfigExchangeSlabTo,
        SchemeField::ConfigAgreedSupport,
        SchemeField::ConfigBestBetQuantity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SchemeField::SchemeType => "scheme_type",
            SchemeField::SchemeSubtype => "scheme_subtype",
            SchemeField::SchemeName => "scheme_name",
            SchemeField::SchemeDescription => "scheme_description",
            SchemeField::SchemePeriod => "scheme_period",
            SchemeField::Duration => "duration",
            SchemeField::DiscountType => "discount_type",
            SchemeField::MaxCap => "max_cap",
            SchemeField::VendorName => "vendor_name",
            SchemeField::PriceDropDate => "price_drop_date",
            SchemeField::StartDate => "start_date",
            SchemeField::EndDate => "end_date",
            SchemeField::FsnFileConfigFile => "fsn_file_config_file",
            SchemeField::MinActualDiscountOrAgreedClaim => "min_actual_discount_or_agreed_claim",
            SchemeField::RemoveGstFromFinalClaim => "remove_gst_from_final_claim",
            SchemeField::OverAndAbove => "over_and_above",
            SchemeField::DiscountSlabType => "discount_slab_type",
            SchemeField::BestBet => "best_bet",
            SchemeField::BrandSupportAbsolute => "brand_support_absolute",
            SchemeField::GstRate => "gst_rate",
            SchemeField::ModelName => "model_name",
            SchemeField::FsnList => "fsn_list",
            SchemeField::ConfigBrandSupport => "config_brand_support",
            SchemeField::ConfigMaxQuantity => "config_max_quantity",
            SchemeField::ConfigUnitSlabLower => "config_unit_slab_lower",
            SchemeField::ConfigUnitSlabUpper => "config_unit_slab_upper",
            SchemeField::ConfigMaxSupportValue => "config_max_support_value",
            SchemeField::ConfigVendorSplitRatio => "config_vendor_split_ratio",
            SchemeField::ConfigMargin => "config_margin",
            SchemeField::ConfigIncomingFsn => "config_incoming_fsn",
            SchemeField::ConfigExchangeSlabFrom => "config_exchange_slab_from",
            SchemeField::ConfigExchangeSlabTo => "config_exchange_slab_to",
            SchemeField::ConfigAgreedSupport => "config_agreed_support",
            SchemeField::ConfigBestBetQuantity => "config_best_bet_quantity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// `config_*` fields default per output schema, not here.
    pub fn is_config(self) -> bool {
        self.name().starts_with("config_")
    }

    pub fn default_value(self) -> &'static str {
        match self {
            SchemeField::SchemeType => "SELL_SIDE",
            SchemeField::SchemeSubtype => "PUC",
            SchemeField::SchemeName => "Unnamed Scheme",
            SchemeField::SchemeDescription => "Details not specified",
            SchemeField::SchemePeriod => "Duration",
            SchemeField::MaxCap => "No Cap",
            SchemeField::VendorName => "Unknown Vendor",
            SchemeField::PriceDropDate => "N/A",
            SchemeField::FsnFileConfigFile => "No",
            SchemeField::MinActualDiscountOrAgreedClaim | SchemeField::OverAndAbove => "FALSE",
            SchemeField::DiscountSlabType
            | SchemeField::BestBet
            | SchemeField::BrandSupportAbsolute
            | SchemeField::GstRate => "Not Applicable",
            SchemeField::FsnList => "None",
            SchemeField::Duration
            | SchemeField::DiscountType
            | SchemeField::StartDate
            | SchemeField::EndDate
            | SchemeField::RemoveGstFromFinalClaim
            | SchemeField::ModelName => "Not Specified",
            _ => "",
        }
    }
}

impl fmt::Display for SchemeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Placeholder values extractors emit instead of leaving a field out.
pub fn is_meaningful(value: &str) -> bool {
    const EMPTY: [&str; 7] = [
        "",
        "n/a",
        "na",
        "none",
        "not specified",
        "not applicable",
        "unknown",
    ];
    let v = value.trim().to_lowercase();
    !EMPTY.contains(&v.as_str())
}

/// Named string fields produced by an extractor, plus resolved product ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemeFields {
    values: BTreeMap<SchemeField, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    resolved_fsns: Vec<String>,
}

impl SchemeFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty values clear the field.
    pub fn set(&mut self, field: SchemeField, value: impl Into<String>) {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, value.to_string());
        }
    }

    pub fn clear(&mut self, field: SchemeField) {
        self.values.remove(&field);
    }

    /// Value as produced, without defaults.
    pub fn raw(&self, field: SchemeField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Value, or the field's default when absent.
    pub fn get(&self, field: SchemeField) -> &str {
        self.raw(field).unwrap_or_else(|| field.default_value())
    }

    /// First meaningful value along `chain`.
    pub fn first_meaningful(&self, chain: &[SchemeField]) -> Option<&str> {
        chain
            .iter()
            .filter_map(|f| self.raw(*f))
            .find(|v| is_meaningful(v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.resolved_fsns.is_empty()
    }

    pub fn resolved_fsns(&self) -> &[String] {
        &self.resolved_fsns
    }

    pub fn set_resolved_fsns(&mut self, fsns: Vec<String>) {
        self.resolved_fsns = fsns;
    }

    /// Known keys of a JSON object. Scalars are stringified, arrays joined.
    pub fn from_json_map(map: &serde_json::Map<String, Value>) -> Self {
        let mut fields = Self::new();
        for (key, value) in map {
            let Some(field) = SchemeField::from_name(key) else {
                continue;
            };
            if let Some(v) = json_to_string(value) {
                fields.set(field, v);
            }
        }
        fields
    }

    pub fn classification(&self) -> Result<SchemeClassification> {
        SchemeClassification::parse(
            self.get(SchemeField::SchemeType),
            self.raw(SchemeField::SchemeSubtype).unwrap_or(""),
        )
    }

    pub fn set_classification(&mut self, c: SchemeClassification) {
        self.set(SchemeField::SchemeType, c.scheme_type.code());
        self.set(SchemeField::SchemeSubtype, c.subtype.code());
    }

    /// Reset fields that do not apply to the current classification.
    pub fn apply_classification_rules(&mut self) {
        let t = SchemeType::parse(self.get(SchemeField::SchemeType));
        let s = self.raw(SchemeField::SchemeSubtype).and_then(SchemeSubtype::parse);

        if !(t == Some(SchemeType::BuySide) && s == Some(SchemeSubtype::PeriodicClaim)) {
            self.clear(SchemeField::DiscountSlabType);
            self.clear(SchemeField::BestBet);
        }
        if t != Some(SchemeType::OneOff) {
            self.clear(SchemeField::BrandSupportAbsolute);
            self.clear(SchemeField::GstRate);
        }
        if !(t == Some(SchemeType::Pdc) || s == Some(SchemeSubtype::Pdc)) {
            self.clear(SchemeField::PriceDropDate);
        }
    }

    /// (filled, total) over the descriptive fields.
    pub fn coverage(&self) -> (usize, usize) {
        let descriptive: Vec<SchemeField> = SchemeField::ALL
            .into_iter()
            .filter(|f| !f.is_config())
            .collect();
        let filled = descriptive
            .iter()
            .filter(|f| self.raw(**f).is_some_and(is_meaningful))
            .count();
        (filled, descriptive.len())
    }

    /// Every descriptive field with defaults applied, plus set config fields.
    pub fn to_report(&self) -> BTreeMap<&'static str, String> {
        SchemeField::ALL
            .into_iter()
            .filter(|f| !f.is_config() || self.raw(*f).is_some())
            .map(|f| (f.name(), self.get(f).to_string()))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(SchemeField, S)> for SchemeFields {
    fn from_iter<I: IntoIterator<Item = (SchemeField, S)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (field, value) in iter {
            fields.set(field, value);
        }
        fields
    }
}

fn json_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string().to_uppercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(json_to_string)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aliases() {
        assert_eq!(SchemeType::parse("OFC"), Some(SchemeType::OneOff));
        assert_eq!(SchemeType::parse("buy side"), Some(SchemeType::BuySide));
        assert_eq!(SchemeType::parse("one-off"), Some(SchemeType::OneOff));
        assert_eq!(SchemeSubtype::parse("PUC/FDC"), Some(SchemeSubtype::Puc));
        assert_eq!(SchemeSubtype::parse("Super Coin"), Some(SchemeSubtype::Sc));
        assert_eq!(SchemeSubtype::parse("BANK_OFFER"), Some(SchemeSubtype::Boc));
        assert_eq!(SchemeSubtype::parse("coupon"), Some(SchemeSubtype::Cp));
        assert_eq!(SchemeSubtype::parse("n/a"), Some(SchemeSubtype::NotApplicable));
        assert_eq!(SchemeSubtype::parse("ZZZ"), None);
    }

    #[test]
    fn test_classification_validity() {
        assert!(SchemeClassification::new(SchemeType::BuySide, SchemeSubtype::Pdc).is_ok());
        assert!(SchemeClassification::new(SchemeType::SellSide, SchemeSubtype::Pdc).is_err());
        assert!(SchemeClassification::new(SchemeType::OneOff, SchemeSubtype::Puc).is_err());
        assert!(SchemeClassification::parse("PDC", "").is_ok());
        assert!(SchemeClassification::parse("SELL_SIDE", "").is_err());
        let c = SchemeClassification::parse("OFC", "N/A").unwrap();
        assert_eq!(c.scheme_type, SchemeType::OneOff);
        assert_eq!(c.to_string(), "ONE_OFF → N/A");
    }

    #[test]
    fn test_defaults_and_empty_values() {
        let mut f = SchemeFields::new();
        assert_eq!(f.get(SchemeField::VendorName), "Unknown Vendor");
        assert_eq!(f.get(SchemeField::ModelName), "Not Specified");
        assert_eq!(f.get(SchemeField::FsnList), "None");
        f.set(SchemeField::VendorName, "  ");
        assert_eq!(f.raw(SchemeField::VendorName), None);
        f.set(SchemeField::VendorName, " Acme ");
        assert_eq!(f.get(SchemeField::VendorName), "Acme");
    }

    #[test]
    fn test_from_json_map_stringifies() {
        let v = json!({
            "scheme_type": "PDC",
            "config_max_quantity": 500,
            "over_and_above": true,
            "fsn_list": ["FSN1", "FSN2"],
            "unrelated": "x",
            "start_date": null
        });
        let f = SchemeFields::from_json_map(v.as_object().unwrap());
        assert_eq!(f.get(SchemeField::SchemeType), "PDC");
        assert_eq!(f.get(SchemeField::ConfigMaxQuantity), "500");
        assert_eq!(f.get(SchemeField::OverAndAbove), "TRUE");
        assert_eq!(f.get(SchemeField::FsnList), "FSN1, FSN2");
        assert_eq!(f.raw(SchemeField::StartDate), None);
    }

    #[test]
    fn test_first_meaningful_skips_placeholders() {
        let f: SchemeFields = [
            (SchemeField::ConfigBrandSupport, "N/A"),
            (SchemeField::BrandSupportAbsolute, "₹500"),
        ]
        .into_iter()
        .collect();
        let chain = [SchemeField::ConfigBrandSupport, SchemeField::BrandSupportAbsolute];
        assert_eq!(f.first_meaningful(&chain), Some("₹500"));
    }

    #[test]
    fn test_classification_rules() {
        let mut f: SchemeFields = [
            (SchemeField::SchemeType, "SELL_SIDE"),
            (SchemeField::SchemeSubtype, "PUC"),
            (SchemeField::BestBet, "10"),
            (SchemeField::GstRate, "18%"),
            (SchemeField::PriceDropDate, "01/06/2024"),
        ]
        .into_iter()
        .collect();
        f.apply_classification_rules();
        assert_eq!(f.raw(SchemeField::BestBet), None);
        assert_eq!(f.raw(SchemeField::GstRate), None);
        assert_eq!(f.get(SchemeField::PriceDropDate), "N/A");

        let mut pc: SchemeFields = [
            (SchemeField::SchemeType, "BUY_SIDE"),
            (SchemeField::SchemeSubtype, "PERIODIC_CLAIM"),
            (SchemeField::BestBet, "10"),
        ]
        .into_iter()
        .collect();
        pc.apply_classification_rules();
        assert_eq!(pc.raw(SchemeField::BestBet), Some("10"));
    }

    #[test]
    fn test_coverage_ignores_placeholders() {
        let f: SchemeFields = [
            (SchemeField::VendorName, "Acme"),
            (SchemeField::StartDate, "Not Specified"),
            (SchemeField::ConfigMargin, "20"),
        ]
        .into_iter()
        .collect();
        assert_eq!(f.coverage(), (1, 22));
    }
}
