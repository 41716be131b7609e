/*!
 * Tests for ISO language code utilities
 */

use readalong::language_utils::{
    get_language_name, language_codes_match, normalize_to_part1_or_part2t, validate_language_code,
};

/// Test normalisation of bibliographic and terminology codes
#[test]
fn test_normalize_withBibliographicCodes_shouldReturnPart1() {
    let cases = [("ger", "de"), ("deu", "de"), ("dut", "nl"), ("chi", "zh"), ("spa", "es"), ("JA", "ja")];
    for (input, expected) in cases {
        assert_eq!(normalize_to_part1_or_part2t(input).unwrap(), expected, "input {}", input);
    }
}

/// Test that invalid codes are rejected rather than passed through
#[test]
fn test_normalize_withInvalidCode_shouldFail() {
    for code in ["", "x", "qqq", "french", "fr-CA"] {
        assert!(normalize_to_part1_or_part2t(code).is_err(), "code {:?}", code);
        assert!(validate_language_code(code).is_err());
    }
}

/// Test matching across code families
#[test]
fn test_languageCodesMatch_acrossFamilies_shouldMatch() {
    assert!(language_codes_match("fr", "fre"));
    assert!(language_codes_match("fra", "FRE"));
    assert!(!language_codes_match("fr", "qqq"));
}

/// Test English names
#[test]
fn test_getLanguageName_withVariousCodes_shouldReturnName() {
    assert_eq!(get_language_name("de").unwrap(), "German");
    assert_eq!(get_language_name("spa").unwrap(), "Spanish");
    assert!(get_language_name("qq").is_err());
}
