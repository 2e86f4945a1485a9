// 🏦 SWIFT Code Rules - classification and headquarters key derivation
//
// A full SWIFT/BIC code is 11 characters: bank, country and location parts
// in the first 8, branch part in the last 3. The branch part "XXX" marks
// the institution's primary (headquarters) entry.

/// Branch suffix marking a code as the institution's headquarters entry.
pub const HEADQUARTERS_SUFFIX: &str = "XXX";

/// Length of a full SWIFT code, branch suffix included.
pub const SWIFT_CODE_LENGTH: usize = 11;

/// A full-length code is a headquarters entry iff its branch part is "XXX".
pub fn is_headquarters(swift_code: &str) -> bool {
    swift_code.ends_with(HEADQUARTERS_SUFFIX)
}

/// Lookup key of the headquarters owning a branch code: the first 8
/// characters with the headquarters suffix appended.
pub fn headquarters_key(swift_code: &str) -> String {
    let prefix: String = swift_code.chars().take(8).collect();
    format!("{prefix}{HEADQUARTERS_SUFFIX}")
}

/// Length gate applied before classification. Codes failing it are
/// malformed and contribute no rows.
pub fn has_valid_length(swift_code: &str) -> bool {
    swift_code.chars().count() == SWIFT_CODE_LENGTH
}

// ============================================================================
// TESTS
// ============================================================================
