//! Hex address helpers: loose format checks and EIP-55 checksumming

use tiny_keccak::{Hasher, Keccak};

/// Returns true if `address` is `0x` followed by exactly 40 hex digits.
///
/// Casing is not inspected, so a string with a broken checksum still passes.
pub fn is_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(hex) => hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Encode an address in its EIP-55 mixed-case form.
///
/// Returns `None` when the input is not a loosely valid address.
///
/// # Example
///
/// ```
/// use tokenlist_mcp::address::checksum_address;
///
/// assert_eq!(
///     checksum_address("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").as_deref(),
///     Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
/// );
/// ```
pub fn checksum_address(address: &str) -> Option<String> {
    if !is_address(address) {
        return None;
    }

    let lower = address[2..].to_ascii_lowercase();
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that well-formed addresses pass regardless of casing
    #[test]
    fn test_is_address_accepts_any_case() {
        assert!(is_address("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"));
        assert!(is_address("0xA0B86991C6218B36C1D19D4A2E9EB0CE3606EB48"));
        assert!(is_address("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"));
    }

    /// Test that malformed strings are rejected
    #[test]
    fn test_is_address_rejects_malformed() {
        assert!(!is_address(""));
        assert!(!is_address("0x"));
        assert!(!is_address("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"));
        assert!(!is_address("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb4"));
        assert!(!is_address("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb488"));
        assert!(!is_address("0xg0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"));
        assert!(!is_address("0Xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"));
    }

    /// Test the reference vectors published with EIP-55
    #[test]
    fn test_checksum_reference_vectors() {
        let vectors = [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ];

        for expected in vectors {
            let lower = expected.to_lowercase();
            assert_eq!(checksum_address(&lower).as_deref(), Some(expected));
            let upper = format!("0x{}", expected[2..].to_uppercase());
            assert_eq!(checksum_address(&upper).as_deref(), Some(expected));
        }
    }

    /// Test that checksumming invalid input yields None instead of panicking
    #[test]
    fn test_checksum_invalid_input() {
        assert_eq!(checksum_address("not an address"), None);
        assert_eq!(checksum_address("0x1234"), None);
    }
}
