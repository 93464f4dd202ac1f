// src/config_gen.rs

use crate::mapping::{DEFAULT_SITE_ID, Enrichment};
use crate::scheme::{SchemeField as F, SchemeFields, SchemeSubtype, SchemeType, is_meaningful};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const PRODUCT_ID_PLACEHOLDER: &str = "Derived from FSN File";

/// Output schema codes. Renaming any of these breaks downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfigType {
    #[serde(rename = "PDC")]
    Pdc,
    #[serde(rename = "BS-PC")]
    BsPc,
    #[serde(rename = "BS-PDC")]
    BsPdc,
    #[serde(rename = "SS-CP")]
    SsCp,
    #[serde(rename = "SS-PUC")]
    SsPuc,
    #[serde(rename = "SS-PRX")]
    SsPrx,
    #[serde(rename = "SS-SC")]
    SsSc,
    #[serde(rename = "SS-LS")]
    SsLs,
}

impl ConfigType {
    pub fn code(self) -> &'static str {
        match self {
            ConfigType::Pdc => "PDC",
            ConfigType::BsPc => "BS-PC",
            ConfigType::BsPdc => "BS-PDC",
            ConfigType::SsCp => "SS-CP",
            ConfigType::SsPuc => "SS-PUC",
            ConfigType::SsPrx => "SS-PRX",
            ConfigType::SsSc => "SS-SC",
            ConfigType::SsLs => "SS-LS",
        }
    }

    /// Generator for a (type, subtype) pair. PDC as a type ignores the subtype.
    fn for_pair(scheme_type: SchemeType, subtype: Option<SchemeSubtype>) -> Option<Self> {
        use SchemeSubtype as S;
        match (scheme_type, subtype) {
            (SchemeType::Pdc, _) => Some(ConfigType::Pdc),
            (SchemeType::BuySide, Some(S::PeriodicClaim)) => Some(ConfigType::BsPc),
            (SchemeType::BuySide, Some(S::Pdc)) => Some(ConfigType::BsPdc),
            (SchemeType::SellSide, Some(S::Cp)) => Some(ConfigType::SsCp),
            (SchemeType::SellSide, Some(S::Puc)) => Some(ConfigType::SsPuc),
            (SchemeType::SellSide, Some(S::Prx)) => Some(ConfigType::SsPrx),
            (SchemeType::SellSide, Some(S::Sc)) => Some(ConfigType::SsSc),
            (SchemeType::SellSide, Some(S::Ls)) => Some(ConfigType::SsLs),
            _ => None,
        }
    }
}

pub type ConfigFields = BTreeMap<String, String>;

/// Generated configuration, serialized without a tag.
///
/// Callers detect failure by the presence of the `error` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigOutput {
    Single {
        config_type: ConfigType,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        fields: ConfigFields,
    },
    Multi {
        config_type: ConfigType,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        products: Vec<ConfigFields>,
    },
    Info {
        info: String,
    },
    Error {
        error: String,
    },
}

impl ConfigOutput {
    pub fn config_type(&self) -> Option<ConfigType> {
        match self {
            ConfigOutput::Single { config_type, .. } | ConfigOutput::Multi { config_type, .. } => {
                Some(*config_type)
            }
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ConfigOutput::Error { .. })
    }

    pub fn to_json(&self) -> serde_json::Value {
        // untagged enum of strings and string maps always serializes
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Pick the output schema for the bag's classification and fill it.
///
/// Missing type and subtype fall back to the bag defaults (SELL_SIDE/PUC),
/// so an empty bag yields an `SS-PUC` config.
pub fn generate_config(fields: &SchemeFields, enrichment: Option<&Enrichment>) -> ConfigOutput {
    let type_raw = fields.get(F::SchemeType);
    let subtype_raw = fields.get(F::SchemeSubtype);
    // errors name the subtype as extracted, not the bag default
    let subtype_shown = fields.raw(F::SchemeSubtype).unwrap_or("(no subtype)");

    let Some(scheme_type) = SchemeType::parse(type_raw) else {
        return unknown(type_raw, subtype_shown);
    };
    if scheme_type == SchemeType::OneOff {
        return ConfigOutput::Info {
            info: "No FSN Config required for one-off claims".to_string(),
        };
    }

    let Some(config_type) = ConfigType::for_pair(scheme_type, SchemeSubtype::parse(subtype_raw))
    else {
        return unknown(type_raw, subtype_shown);
    };

    let (description, map) = build_fields(config_type, fields, enrichment);
    debug!(config_type = config_type.code(), fields = map.len(), "Generated config");
    expand_products(config_type, description, map, fields.resolved_fsns())
}

fn unknown(type_raw: &str, subtype_raw: &str) -> ConfigOutput {
    warn!(scheme_type = %type_raw, subtype = %subtype_raw, "No config generator");
    ConfigOutput::Error {
        error: format!("Unknown scheme configuration for {type_raw} - {subtype_raw}"),
    }
}

/// First meaningful value of `chain`, else `default`.
fn pick(fields: &SchemeFields, chain: &[F], default: &str) -> String {
    fields.first_meaningful(chain).unwrap_or(default).to_string()
}

fn build_fields(
    config_type: ConfigType,
    fields: &SchemeFields,
    enrichment: Option<&Enrichment>,
) -> (Option<String>, ConfigFields) {
    let brand_support = || pick(fields, &[F::ConfigBrandSupport, F::BrandSupportAbsolute], "Not Specified");
    let max_quantity = || pick(fields, &[F::ConfigMaxQuantity], "999999");
    let max_support = || pick(fields, &[F::ConfigMaxSupportValue, F::MaxCap], "No Cap");
    let slab_lower = || pick(fields, &[F::ConfigUnitSlabLower], "0");
    let slab_upper = || pick(fields, &[F::ConfigUnitSlabUpper], "999999");
    let split_ratio = || pick(fields, &[F::ConfigVendorSplitRatio], "100");
    let enriched_margin = enrichment
        .map(|e| e.margin.as_str())
        .filter(|m| is_meaningful(m));

    let mut map = ConfigFields::new();
    let mut put = |key: &str, value: String| {
        map.insert(key.to_string(), value);
    };
    let mut description = None;

    match config_type {
        ConfigType::Pdc => {
            put("brandSupport", brand_support());
            put("maxQuantity", max_quantity());
            put("priceDropDate", pick(fields, &[F::PriceDropDate], "N/A"));
            put("maxSupportValue", max_support());
        }
        ConfigType::BsPc => {
            put("unitSlabLower", slab_lower());
            put("unitSlabUpper", slab_upper());
            put("brandSupport", brand_support());
            put("maxSupportValue", max_support());
            put(
                "bestBetQuantity",
                pick(fields, &[F::ConfigBestBetQuantity, F::BestBet], "N/A"),
            );
        }
        ConfigType::BsPdc => {
            put("brandSupport", brand_support());
            put("maxQuantity", max_quantity());
            put("maxSupportValue", max_support());
        }
        ConfigType::SsCp => {
            put("brandSupport", brand_support());
            put("vendorSplitRatio", split_ratio());
        }
        ConfigType::SsPuc | ConfigType::SsLs => {
            put("brandSupport", brand_support());
            put("vendorSplitRatio", split_ratio());
            put("unitSlabLower", slab_lower());
            put("unitSlabUpper", slab_upper());
            put("maxSupportValue", max_support());

            let extracted_margin = fields.first_meaningful(&[F::ConfigMargin]);
            let margin = if config_type == ConfigType::SsLs {
                enriched_margin.or(extracted_margin)
            } else {
                extracted_margin.or(enriched_margin)
            };
            put("margin", margin.unwrap_or("0").to_string());

            if config_type == ConfigType::SsLs {
                let (dmrp_type, dmrp_value, site_id) = match enrichment {
                    Some(e) => (e.dmrp_type.code().to_string(), e.dmrp_value.clone(), e.site_id.clone()),
                    None => (
                        "Not Specified".to_string(),
                        "Not Specified".to_string(),
                        DEFAULT_SITE_ID.to_string(),
                    ),
                };
                put("dmrpType", dmrp_type);
                put("dmrpValue", dmrp_value);
                put("site_id", site_id);
                description = Some(
                    if enrichment.is_some() {
                        "Lifestyle Scheme - DMRP details from brand mapping"
                    } else {
                        "Lifestyle Scheme - DMRP details to be populated from DMRP file"
                    }
                    .to_string(),
                );
            }
        }
        ConfigType::SsPrx => {
            put("incomingFsn", pick(fields, &[F::ConfigIncomingFsn], "Not Specified"));
            put("vendorSplitRatio", split_ratio());
            put("exchangeSlabFrom", pick(fields, &[F::ConfigExchangeSlabFrom], "0"));
            put("exchangeSlabTo", pick(fields, &[F::ConfigExchangeSlabTo], "999999"));
            put(
                "agreedSupport",
                pick(fields, &[F::ConfigAgreedSupport, F::ConfigBrandSupport], "0"),
            );
        }
        ConfigType::SsSc => {
            put("brandSupport", brand_support());
        }
    }

    (description, map)
}

/// One `fields` map, or one map per product id when there are several.
fn expand_products(
    config_type: ConfigType,
    description: Option<String>,
    mut fields: ConfigFields,
    fsns: &[String],
) -> ConfigOutput {
    match fsns {
        [] | [_] => {
            let product = fsns.first().map(String::as_str).unwrap_or(PRODUCT_ID_PLACEHOLDER);
            fields.insert("ProductId".to_string(), product.to_string());
            ConfigOutput::Single {
                config_type,
                description,
                fields,
            }
        }
        many => {
            let products = many
                .iter()
                .map(|fsn| {
                    let mut product = fields.clone();
                    product.insert("ProductId".to_string(), fsn.clone());
                    product
                })
                .collect();
            ConfigOutput::Multi {
                config_type,
                description,
                products,
            }
        }
    }
}
