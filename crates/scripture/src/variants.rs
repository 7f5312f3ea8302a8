//! Versioned template tables for fallback synthesis
//!
//! Each passage gets one reflection line and one application line. The line
//! is chosen by hashing a stable key derived from the reference, so the same
//! passage always renders the same text. Changing a table or the key format
//! requires bumping `VARIANT_TABLE_VERSION`; the version is part of the
//! hashed key.

use sha2::{Digest, Sha256};

use crate::reference::parse_reference;

pub const VARIANT_TABLE_VERSION: u32 = 1;

/// `{reference}` is replaced with the passage reference.
pub const REFLECTION_VARIANTS: &[&str] = &[
    "Read {reference} slowly and note what it reveals about the character of God.",
    "Consider what {reference} meant to its first hearers before asking what it means today.",
    "Notice the verbs in {reference}: who is acting, and who is receiving?",
    "Trace how {reference} connects to the wider story of redemption.",
    "Ask which promise in {reference} you find hardest to believe, and why.",
    "Compare {reference} with a parallel passage and mark what each adds.",
];

pub const APPLICATION_VARIANTS: &[&str] = &[
    "Choose one phrase from {reference} to memorize this week.",
    "Write a short prayer that responds to {reference}.",
    "Name one decision this week that {reference} should shape.",
    "Share {reference} with someone and talk through what it asks of you.",
    "Journal about a time {reference} would have changed your response.",
];

/// Which table a key is hashed for; keeps the two selections independent.
#[derive(Debug, Clone, Copy)]
pub enum VariantSlot {
    Reflection,
    Application,
}

impl VariantSlot {
    fn label(self) -> &'static str {
        match self {
            VariantSlot::Reflection => "reflection",
            VariantSlot::Application => "application",
        }
    }

    fn table(self) -> &'static [&'static str] {
        match self {
            VariantSlot::Reflection => REFLECTION_VARIANTS,
            VariantSlot::Application => APPLICATION_VARIANTS,
        }
    }
}

/// Stable key for a reference: `v<version>|book|chapter|verse`, lower-cased.
/// Unparseable references hash their trimmed text.
pub fn stable_key(reference: &str) -> String {
    match parse_reference(reference) {
        Some(parsed) => format!(
            "v{VARIANT_TABLE_VERSION}|{}|{}|{}",
            parsed.book.to_lowercase(),
            parsed.chapter,
            parsed.verse.unwrap_or_default()
        ),
        None => format!("v{VARIANT_TABLE_VERSION}|{}", reference.trim().to_lowercase()),
    }
}

/// `u64_be(sha256(key)[..8]) % count`. Returns 0 for an empty table.
pub fn variant_index(key: &str, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % count as u64) as usize
}

/// Render the selected variant for `reference` in `slot`.
pub fn render_variant(reference: &str, slot: VariantSlot) -> String {
    let table = slot.table();
    let key = format!("{}|{}", stable_key(reference), slot.label());
    table[variant_index(&key, table.len())].replace("{reference}", reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_is_stable_and_in_range() {
        for key in ["v1|john|3|16", "v1|psalm|23|", "anything"] {
            let first = variant_index(key, REFLECTION_VARIANTS.len());
            assert!(first < REFLECTION_VARIANTS.len());
            for _ in 0..10 {
                assert_eq!(variant_index(key, REFLECTION_VARIANTS.len()), first);
            }
        }
    }

    #[test]
    fn index_for_empty_table_is_zero() {
        assert_eq!(variant_index("v1|john|3|16", 0), 0);
    }

    #[test]
    fn known_digest_prefix() {
        // sha256("abc") starts with ba7816bf8f01cfea.
        let expected = (0xba78_16bf_8f01_cfeau64 % 7) as usize;
        assert_eq!(variant_index("abc", 7), expected);
    }

    #[test]
    fn stable_key_ignores_case_and_spacing() {
        assert_eq!(stable_key("John 3:16"), "v1|john|3|16");
        assert_eq!(stable_key(" JOHN  3:16 "), "v1|john|3|16");
        assert_eq!(stable_key("Psalm 23"), "v1|psalm|23|");
        assert_eq!(stable_key("Sermon on the Mount"), "v1|sermon on the mount");
    }

    #[test]
    fn rendered_variant_names_the_reference() {
        let line = render_variant("Romans 8:28", VariantSlot::Reflection);
        assert!(line.contains("Romans 8:28"), "got: {line}");
        assert!(!line.contains("{reference}"));
        assert_eq!(line, render_variant("Romans 8:28", VariantSlot::Reflection));
    }
}
