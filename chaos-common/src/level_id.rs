//! Level identifier and content hash helpers
//!
//! Custom levels are identified as `custom_level_<40 hex chars>`. Built-in
//! levels use free-form identifiers and carry no content hash.

/// Prefix of every custom level identifier
pub const CUSTOM_LEVEL_PREFIX: &str = "custom_level_";

/// Length of a content hash
pub const HASH_LEN: usize = 40;

const MARKER_OFFSET: usize = 12;
const HASH_OFFSET: usize = MARKER_OFFSET + 1;
const MIN_LEVEL_ID_LEN: usize = HASH_OFFSET + HASH_LEN;

/// Extract the content hash from a level identifier.
///
/// Returns `None` for identifiers shorter than 53 characters or without the
/// `_` marker at offset 12. The hash is normalised to uppercase.
pub fn hash_of_level_id(level_id: &str) -> Option<String> {
    if level_id.len() < MIN_LEVEL_ID_LEN {
        return None;
    }

    if level_id.as_bytes()[MARKER_OFFSET] != b'_' {
        return None;
    }

    level_id
        .get(HASH_OFFSET..MIN_LEVEL_ID_LEN)
        .map(normalize_hash)
}

/// Build the custom level identifier for a content hash
pub fn custom_level_id(hash: &str) -> String {
    format!("{}{}", CUSTOM_LEVEL_PREFIX, normalize_hash(hash))
}

/// Canonical (uppercase) form of a content hash
pub fn normalize_hash(hash: &str) -> String {
    hash.trim().to_ascii_uppercase()
}

/// True if `s` looks like a content hash (40 hex digits)
pub fn is_content_hash(s: &str) -> bool {
    s.len() == HASH_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_hash_of_custom_level_id() {
        let level_id = format!("custom_level_{}", HASH);
        assert_eq!(
            hash_of_level_id(&level_id),
            Some(HASH.to_ascii_uppercase())
        );
    }

    #[test]
    fn test_trailing_suffix_is_ignored() {
        // Duplicate installs get a folder suffix appended after the hash
        let level_id = format!("custom_level_{} WIP", HASH);
        assert_eq!(
            hash_of_level_id(&level_id),
            Some(HASH.to_ascii_uppercase())
        );
    }

    #[test]
    fn test_short_identifier_has_no_hash() {
        assert_eq!(hash_of_level_id("100Bills"), None);
        assert_eq!(hash_of_level_id("custom_level_ABC"), None);
    }

    #[test]
    fn test_missing_marker_has_no_hash() {
        let level_id = format!("customXlevelX{}", HASH);
        assert_eq!(hash_of_level_id(&level_id), None);
    }

    #[test]
    fn test_custom_level_id_round_trip() {
        let level_id = custom_level_id(HASH);
        assert!(level_id.starts_with(CUSTOM_LEVEL_PREFIX));
        assert_eq!(hash_of_level_id(&level_id), Some(normalize_hash(HASH)));
    }

    #[test]
    fn test_is_content_hash() {
        assert!(is_content_hash(HASH));
        assert!(!is_content_hash("25f"));
        assert!(!is_content_hash(&format!("{}zz", &HASH[..38])));
    }
}
