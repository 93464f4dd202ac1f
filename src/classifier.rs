// src/classifier.rs

use crate::error::{Result, SchemeError};
use crate::lexicon::{Lexicon, SchemeKeywords};
use crate::scheme::{SchemeClassification, SchemeSubtype, SchemeType};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

/// Keyword classification with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordClassification {
    pub classification: SchemeClassification,
    pub reasoning: String,
    pub matched: Vec<String>,
}

struct Rule {
    label: &'static str,
    scheme_type: SchemeType,
    subtype: SchemeSubtype,
    keywords: Vec<(String, Regex)>,
}

/// Deterministic (type, subtype) classifier. First rule with a hit wins.
pub struct SchemeClassifier {
    rules: Vec<Rule>,
}

impl SchemeClassifier {
    pub fn new(keywords: &SchemeKeywords) -> Result<Self> {
        use SchemeSubtype as S;
        use SchemeType as T;

        let groups: [(&'static str, T, S, &[String]); 8] = [
            ("ONE_OFF", T::OneOff, S::NotApplicable, keywords.one_off.as_slice()),
            ("BUY_SIDE → PDC", T::BuySide, S::Pdc, keywords.buy_side_pdc.as_slice()),
            ("BUY_SIDE → PERIODIC_CLAIM", T::BuySide, S::PeriodicClaim, keywords.periodic_claim.as_slice()),
            ("SELL_SIDE → BANK_OFFER", T::SellSide, S::Boc, keywords.bank_offer.as_slice()),
            ("SELL_SIDE → COUPON", T::SellSide, S::Cp, keywords.coupon.as_slice()),
            ("SELL_SIDE → SUPER_COIN", T::SellSide, S::Sc, keywords.super_coin.as_slice()),
            ("SELL_SIDE → PREXO", T::SellSide, S::Prx, keywords.prexo.as_slice()),
            ("SELL_SIDE → PUC/FDC", T::SellSide, S::Puc, keywords.puc_fdc.as_slice()),
        ];

        let rules = groups
            .into_iter()
            .map(|(label, scheme_type, subtype, words)| {
                Ok(Rule {
                    label,
                    scheme_type,
                    subtype,
                    keywords: compile_words(words)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    pub fn from_lexicon(lexicon: &Lexicon) -> Result<Self> {
        Self::new(&lexicon.scheme)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_lexicon(&Lexicon::builtin()?)
    }

    pub fn classify(&self, combined_text: &str) -> KeywordClassification {
        for rule in &self.rules {
            let matched: Vec<String> = rule
                .keywords
                .iter()
                .filter(|(_, re)| re.is_match(combined_text))
                .map(|(word, _)| word.clone())
                .collect();
            if matched.is_empty() {
                continue;
            }

            debug!(rule = rule.label, hits = matched.len(), "Keyword rule matched");
            return KeywordClassification {
                classification: SchemeClassification {
                    scheme_type: rule.scheme_type,
                    subtype: rule.subtype,
                },
                reasoning: format!("Found {} keywords: {}", rule.label, matched.join(", ")),
                matched,
            };
        }

        KeywordClassification {
            classification: SchemeClassification {
                scheme_type: SchemeType::SellSide,
                subtype: SchemeSubtype::Puc,
            },
            reasoning: "No specific keywords found. Defaulting to SELL_SIDE → PUC".to_string(),
            matched: Vec::new(),
        }
    }
}

/// Case-insensitive whole-word matchers that also accept `-s` / `-es` plurals.
fn compile_words(words: &[String]) -> Result<Vec<(String, Regex)>> {
    words
        .iter()
        .map(|w| {
            let pattern = format!(r"(?i)\b{}(?:s|es)?\b", regex::escape(w));
            Regex::new(&pattern)
                .map(|re| (w.clone(), re))
                .map_err(|source| SchemeError::Pattern { pattern, source })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> SchemeClassifier {
        SchemeClassifier::builtin().unwrap()
    }

    fn pair(text: &str) -> (SchemeType, SchemeSubtype) {
        let c = classifier().classify(text).classification;
        (c.scheme_type, c.subtype)
    }

    #[test]
    fn test_empty_text_defaults() {
        let r = classifier().classify("");
        assert_eq!(r.classification.scheme_type, SchemeType::SellSide);
        assert_eq!(r.classification.subtype, SchemeSubtype::Puc);
        assert!(r.reasoning.starts_with("No specific keywords found"));
        assert!(r.matched.is_empty());
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(
            pair("One-off support for the price drop on Model X"),
            (SchemeType::OneOff, SchemeSubtype::NotApplicable)
        );
        assert_eq!(
            pair("Price drop claim for JBP partners"),
            (SchemeType::BuySide, SchemeSubtype::Pdc)
        );
        assert_eq!(
            pair("Q2 JBP quarterly support"),
            (SchemeType::BuySide, SchemeSubtype::PeriodicClaim)
        );
        assert_eq!(
            pair("HDFC bank offer with coupon stacking"),
            (SchemeType::SellSide, SchemeSubtype::Boc)
        );
        assert_eq!(pair("Use coupon SAVE10"), (SchemeType::SellSide, SchemeSubtype::Cp));
        assert_eq!(pair("Earn SuperCoins"), (SchemeType::SellSide, SchemeSubtype::Sc));
        assert_eq!(pair("Exchange offer on old phones"), (SchemeType::SellSide, SchemeSubtype::Prx));
        assert_eq!(pair("Sellout support for June"), (SchemeType::SellSide, SchemeSubtype::Puc));
    }

    #[test]
    fn test_whole_words_only() {
        let r = classifier().classify("totally pucca scheme");
        assert!(r.matched.is_empty());
    }

    #[test]
    fn test_plural_forms_match() {
        assert_eq!(
            pair("Customers can redeem coupons worth 200"),
            (SchemeType::SellSide, SchemeSubtype::Cp)
        );
        assert_eq!(
            pair("Bank offers on HDFC cards"),
            (SchemeType::SellSide, SchemeSubtype::Boc)
        );
        assert_eq!(
            pair("Exchange offers on old phones"),
            (SchemeType::SellSide, SchemeSubtype::Prx)
        );
        assert_eq!(
            pair("Price drops effective Monday"),
            (SchemeType::BuySide, SchemeSubtype::Pdc)
        );
        let r = classifier().classify("Two vouchers per order");
        assert_eq!(r.matched, vec!["voucher".to_string()]);
    }

    #[test]
    fn test_reasoning_cites_keywords() {
        let r = classifier().classify("Coupon and voucher based offer");
        assert_eq!(r.matched, vec!["coupon".to_string(), "voucher".to_string()]);
        assert_eq!(r.reasoning, "Found SELL_SIDE → COUPON keywords: coupon, voucher");
    }

    #[test]
    fn test_result_always_in_taxonomy() {
        let c = classifier();
        for text in ["", "bank offer", "ad hoc", "pdc", "prexo", "lorem ipsum"] {
            let r = c.classify(text).classification;
            assert!(SchemeClassification::new(r.scheme_type, r.subtype).is_ok());
        }
    }
}
