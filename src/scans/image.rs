use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ImageError {
    #[error("No image provided")]
    Empty,
    #[error("Image too large (max {max_mb} MB)")]
    TooLarge { max_mb: usize },
    #[error("Invalid image format")]
    InvalidBase64,
}

/// Payload hygiene for the untrusted image string. Strips a
/// `data:*;base64,` prefix, rejects empty input and foreign characters, and
/// bounds the decoded size *before* anything goes over the network. Whether
/// the bytes are actually an image is the providers' problem, so the payload
/// is never decoded here.
pub fn validate_image(raw: &str, max_bytes: usize) -> Result<String, ImageError> {
    let data = strip_data_url_prefix(raw.trim());

    if data.is_empty() {
        return Err(ImageError::Empty);
    }

    let valid_alphabet = data
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=');
    if !valid_alphabet {
        return Err(ImageError::InvalidBase64);
    }

    // Padding may only trail, at most two characters, and must leave at
    // least one decoded byte; "=" or "==" alone is not base64.
    let padding = data.bytes().rev().take_while(|&b| b == b'=').count();
    if padding > 2 || data[..data.len() - padding].bytes().any(|b| b == b'=') {
        return Err(ImageError::InvalidBase64);
    }

    let decoded = decoded_len(data);
    if decoded == 0 {
        return Err(ImageError::InvalidBase64);
    }
    if decoded > max_bytes {
        return Err(ImageError::TooLarge {
            max_mb: max_bytes / (1024 * 1024),
        });
    }

    Ok(data.to_string())
}

fn strip_data_url_prefix(raw: &str) -> &str {
    if raw.starts_with("data:") {
        if let Some(idx) = raw.find(";base64,") {
            return &raw[idx + ";base64,".len()..];
        }
    }
    raw
}

/// Decoded byte length computed from the string alone: 3 bytes per 4
/// characters, minus padding.
fn decoded_len(b64: &str) -> usize {
    let padding = b64.bytes().rev().take_while(|&b| b == b'=').count().min(2);
    ((b64.len() / 4) * 3 + (b64.len() % 4) * 3 / 4).saturating_sub(padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 5 * 1024 * 1024;

    #[test]
    fn strips_data_url_prefix() {
        assert_eq!(
            validate_image("data:image/jpeg;base64,AAAA", MAX).unwrap(),
            "AAAA"
        );
        assert_eq!(
            validate_image("data:image/png;base64,QUJD", MAX).unwrap(),
            "QUJD"
        );
    }

    #[test]
    fn accepts_bare_base64() {
        assert_eq!(validate_image("QUJDRA==", MAX).unwrap(), "QUJDRA==");
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(validate_image("", MAX), Err(ImageError::Empty));
        assert_eq!(validate_image("   ", MAX), Err(ImageError::Empty));
        assert_eq!(
            validate_image("data:image/jpeg;base64,", MAX),
            Err(ImageError::Empty)
        );
    }

    #[test]
    fn rejects_padding_only_input() {
        assert_eq!(validate_image("=", MAX), Err(ImageError::InvalidBase64));
        assert_eq!(validate_image("==", MAX), Err(ImageError::InvalidBase64));
        assert_eq!(
            validate_image("data:image/jpeg;base64,==", MAX),
            Err(ImageError::InvalidBase64)
        );
    }

    #[test]
    fn rejects_malformed_padding() {
        // Interior padding and over-long padding are not base64.
        assert_eq!(validate_image("AA=A", MAX), Err(ImageError::InvalidBase64));
        assert_eq!(validate_image("A===", MAX), Err(ImageError::InvalidBase64));
    }

    #[test]
    fn rejects_input_too_short_to_decode() {
        // One base64 character cannot encode a byte.
        assert_eq!(validate_image("A", MAX), Err(ImageError::InvalidBase64));
    }

    #[test]
    fn rejects_foreign_characters() {
        assert_eq!(
            validate_image("not base64 at all!", MAX),
            Err(ImageError::InvalidBase64)
        );
        assert_eq!(
            validate_image("AAAA\u{1F354}", MAX),
            Err(ImageError::InvalidBase64)
        );
    }

    #[test]
    fn rejects_oversized_payload() {
        // 8 MB of base64 characters decodes to ~6 MB.
        let big = "A".repeat(8 * 1024 * 1024);
        assert_eq!(
            validate_image(&big, MAX),
            Err(ImageError::TooLarge { max_mb: 5 })
        );
    }

    #[test]
    fn size_limit_uses_decoded_length() {
        // 4 chars -> 3 bytes; exactly at the limit passes.
        let at_limit = "A".repeat(4);
        assert!(validate_image(&at_limit, 3).is_ok());
        assert_eq!(
            validate_image(&at_limit, 2),
            Err(ImageError::TooLarge { max_mb: 0 })
        );
    }

    #[test]
    fn padding_reduces_decoded_length() {
        assert_eq!(decoded_len("QUJDRA=="), 4);
        assert_eq!(decoded_len("QUJD"), 3);
    }
}
