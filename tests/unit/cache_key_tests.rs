/*!
 * Tests for cache key construction
 */

use std::collections::HashSet;

use readalong::cache::key::{index_of, paragraph_index_from_f64, parse_paragraph_index};
use readalong::cache::{build_audio_key, build_translation_key, KeyKind};
use readalong::errors::KeyError;

/// Test that the two key families never share an identifier
#[test]
fn test_keys_withSameDocumentAndIndex_shouldDifferByKind() {
    let translation = build_translation_key("bookA", 0, "alloy").unwrap();
    let audio = build_audio_key("bookA", 0, "alloy", "tts-1").unwrap();

    assert_ne!(translation.as_str(), audio.as_str());
    assert_eq!(translation.kind(), KeyKind::Translation);
    assert_eq!(audio.kind(), KeyKind::Audio);
}

/// Test that key accessors expose the inputs unescaped
#[test]
fn test_key_accessors_withEscapedInputs_shouldReturnOriginals() {
    let key = build_audio_key("le petit prince", 12, "alloy", "tts-1").unwrap();

    assert_eq!(key.document_id(), "le petit prince");
    assert_eq!(key.paragraph_index(), 12);
    assert_eq!(key.components(), ["alloy".to_string(), "tts-1".to_string()]);
    assert!(!key.as_str().contains(' '));
}

/// Test injectivity over documents, paragraphs and languages that look alike
#[test]
fn test_buildTranslationKey_withLookalikeInputs_shouldNotCollide() {
    let inputs = [
        ("bookA", 1, "fr"),
        ("bookA", 11, "fr"),
        ("bookA.1", 1, "fr"),
        ("bookA", 1, "1.fr"),
        ("book~2EA", 1, "fr"),
        ("book.A", 1, "fr"),
    ];

    let keys: HashSet<String> = inputs
        .iter()
        .map(|(doc, idx, lang)| build_translation_key(doc, *idx, lang).unwrap().to_string())
        .collect();
    assert_eq!(keys.len(), inputs.len());
}

/// Test that empty components are rejected for every field
#[test]
fn test_builders_withEmptyComponents_shouldFail() {
    assert!(matches!(build_translation_key("bookA", 0, ""), Err(KeyError::InvalidKeyInput(_))));
    assert!(matches!(build_audio_key("bookA", 0, "", "tts-1"), Err(KeyError::InvalidKeyInput(_))));
    assert!(matches!(build_audio_key("bookA", 0, "alloy", " "), Err(KeyError::InvalidKeyInput(_))));
}

/// Test numeric index conversion from floating point and text
#[test]
fn test_paragraphIndex_conversions_shouldRejectNonIntegers() {
    assert_eq!(paragraph_index_from_f64(3.0).unwrap(), 3);
    assert!(paragraph_index_from_f64(2.5).is_err());
    assert!(paragraph_index_from_f64(f64::NAN).is_err());
    assert!(paragraph_index_from_f64(f64::INFINITY).is_err());
    assert!(paragraph_index_from_f64(-1.0).is_err());

    assert_eq!(parse_paragraph_index(" 7 ").unwrap(), 7);
    assert_eq!(parse_paragraph_index("4.0").unwrap(), 4);
    assert!(parse_paragraph_index("4.2").is_err());
    assert!(parse_paragraph_index("seven").is_err());

    // Negative text parses; the builder rejects it
    let negative = parse_paragraph_index("-2").unwrap();
    assert!(build_translation_key("bookA", negative, "fr").is_err());
}

/// Test that in-memory positions convert losslessly
#[test]
fn test_indexOf_withPosition_shouldMatchKeyIndex() {
    let index = index_of(42).unwrap();
    let key = build_translation_key("bookA", index, "de").unwrap();
    assert_eq!(key.paragraph_index(), 42);
}
