use std::borrow::Cow;

/// True for characters allowed by the XML 1.0 `Char` production.
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

/// Removes characters that cannot appear in an XML 1.0 document.
///
/// Feed text is attacker-controlled and ends up re-serialized as Atom, where a
/// stray NUL or ESC byte makes the whole output unparseable. Tab, newline and
/// carriage return are kept.
///
/// Returns `Cow::Borrowed` when nothing needs removing (the common case).
pub fn xml_safe_text(s: &str) -> Cow<'_, str> {
    if s.chars().all(is_xml_char) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| is_xml_char(c)).collect())
}

/// Trims surrounding whitespace and maps empty strings to `None`.
pub fn non_empty(s: impl AsRef<str>) -> Option<String> {
    let trimmed = s.as_ref().trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_is_borrowed() {
        let input = "Hello, world! <b>markup</b> & entities";
        let result = xml_safe_text(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_whitespace_controls_preserved() {
        let input = "line1\nline2\ttabbed\r\nwindows";
        assert!(matches!(xml_safe_text(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_c0_controls_removed() {
        let result = xml_safe_text("he\x00ll\x07o\x08 w\x0bor\x0cld\x1b!");
        assert!(matches!(result, Cow::Owned(_)));
        assert_eq!(result, "hello world!");
    }

    #[test]
    fn test_noncharacters_removed() {
        assert_eq!(xml_safe_text("a\u{FFFE}b\u{FFFF}c"), "abc");
    }

    #[test]
    fn test_unicode_preserved() {
        let input = "日本語 テキスト 🎉";
        assert_eq!(xml_safe_text(input), input);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  title "), Some("title".to_string()));
        assert_eq!(non_empty("   "), None);
        assert_eq!(non_empty(""), None);
    }
}
