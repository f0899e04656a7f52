use base64::engine::general_purpose::STANDARD;
use base64::engine::Engine as _;

/// Encodes raw bytes with the standard (padded) base64 alphabet.
pub fn base64_encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_uses_standard_alphabet() {
        // 0xfb 0xff encodes to characters outside the URL-safe alphabet.
        assert_eq!(base64_encode_bytes(&[0xfb, 0xff]), "+/8=");
        assert_eq!(base64_encode_bytes(b""), "");
    }
}
