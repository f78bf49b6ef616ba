//! Address normalization utilities.
//!
//! Owner and object addresses reach us in several spellings:
//! - Short form: "0x2"
//! - Full form: "0x0000000000000000000000000000000000000000000000000000000000000002"
//! - Upper case or without prefix: "ABC"
//!
//! Owner comparisons and per-owner bookkeeping always go through
//! [`normalize_address`] so the same wallet never shows up under two keys.

/// Normalize an address to lowercase with 0x prefix and full 64 hex characters.
///
/// Surrounding whitespace is ignored.
///
/// # Examples
///
/// ```
/// use vitae_types::address::normalize_address;
///
/// assert_eq!(
///     normalize_address("0x2"),
///     "0x0000000000000000000000000000000000000000000000000000000000000002"
/// );
/// assert_eq!(
///     normalize_address(" ABC "),
///     "0x0000000000000000000000000000000000000000000000000000000000000abc"
/// );
/// ```
pub fn normalize_address(addr: &str) -> String {
    let trimmed = addr.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .to_lowercase();
    if hex.len() < 64 {
        format!("0x{:0>64}", hex)
    } else {
        format!("0x{}", hex)
    }
}

/// Returns true when two address spellings denote the same account.
pub fn same_address(a: &str, b: &str) -> bool {
    normalize_address(a) == normalize_address(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("0xABC"),
            "0x0000000000000000000000000000000000000000000000000000000000000abc"
        );
        assert_eq!(
            normalize_address("ABC"),
            "0x0000000000000000000000000000000000000000000000000000000000000abc"
        );
        assert_eq!(
            normalize_address("0x0000000000000000000000000000000000000000000000000000000000000002"),
            "0x0000000000000000000000000000000000000000000000000000000000000002"
        );
    }

    #[test]
    fn test_same_address() {
        assert!(same_address("0x2", "0X0000000000000000000000000000000000000000000000000000000000000002"));
        assert!(!same_address("0x2", "0x3"));
    }
}
