use unicode_normalization::UnicodeNormalization;

/// Normalize raw extracted text before any matching happens.
///
/// Non-breaking space and non-breaking hyphen are mapped to ASCII first,
/// since NFKC alone turns U+2011 into U+2010 rather than `-`.
pub fn normalize_text(text: &str) -> String {
    let mapped: String = text
        .replace("\r\n", "\n")
        .chars()
        .filter_map(map_char)
        .collect();

    mapped.nfkc().filter_map(map_char).collect()
}

fn map_char(c: char) -> Option<char> {
    match c {
        '\u{00A0}' => Some(' '),
        '\u{2011}' | '\u{2010}' => Some('-'),
        // line break variants
        '\r' | '\u{2028}' | '\u{2029}' | '\u{0085}' => Some('\n'),
        // zero-width and BOM
        '\u{200B}'..='\u{200D}' | '\u{FEFF}' | '\u{2060}' => None,
        // soft hyphen
        '\u{00AD}' => None,
        '\n' | '\t' => Some(c),
        c if c.is_control() => None,
        c => Some(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_breaks_standardized() {
        assert_eq!(normalize_text("a\r\nb\rc\u{2028}d\u{2029}e"), "a\nb\nc\nd\ne");
    }

    #[test]
    fn test_invisible_and_control_stripped() {
        let raw = "sch\u{200B}eme\u{00AD} \u{0007}claim\u{FEFF}";
        assert_eq!(normalize_text(raw), "scheme claim");
    }

    #[test]
    fn test_nbsp_and_nb_hyphen() {
        assert_eq!(normalize_text("CLM\u{2011}123\u{00A0}ok"), "CLM-123 ok");
    }

    #[test]
    fn test_nfkc_folds_compatibility_forms() {
        // fullwidth digits and the fi ligature
        assert_eq!(normalize_text("\u{FF11}\u{FF10}% \u{FB01}le"), "10% file");
    }

    #[test]
    fn test_tabs_and_newlines_kept() {
        assert_eq!(normalize_text("a\tb\n\nc"), "a\tb\n\nc");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_text("x\u{00A0}y\r\n\u{200C}z");
        assert_eq!(normalize_text(&once), once);
    }
}
