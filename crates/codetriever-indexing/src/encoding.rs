//! Best-effort text decoding for file content read off disk.

/// Decode `bytes` as text, or return `None` if the file looks binary.
///
/// NUL bytes are the first and cheapest binary signal. Past that, a UTF-8
/// fast path covers the overwhelming majority of source files; anything
/// else falls back to a BOM-driven guess via `encoding_rs`, and a malformed
/// decode is treated as binary rather than passed through with replacement
/// characters.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    if bytes.contains(&0) {
        tracing::debug!("file contains NUL bytes, treating as binary");
        return None;
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.to_string());
    }

    let (encoding, _bom_len) = encoding_rs::Encoding::for_bom(bytes).unwrap_or((encoding_rs::UTF_8, 0));
    let (decoded, actual_encoding, malformed) = encoding.decode(bytes);
    if malformed {
        tracing::debug!(encoding = actual_encoding.name(), "file failed to decode cleanly, treating as binary");
        return None;
    }
    Some(decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_utf8() {
        assert_eq!(decode_text(b"fn main() {}").as_deref(), Some("fn main() {}"));
    }

    #[test]
    fn treats_nul_bytes_as_binary() {
        assert_eq!(decode_text(b"\x00\x01\x02"), None);
    }

    #[test]
    fn decodes_utf16_with_bom() {
        let bytes: Vec<u8> = [0xFFu8, 0xFE].into_iter().chain("hi".encode_utf16().flat_map(u16::to_le_bytes)).collect();
        assert_eq!(decode_text(&bytes).as_deref(), Some("hi"));
    }
}
