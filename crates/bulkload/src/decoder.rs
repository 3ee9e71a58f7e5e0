//! 🔬 decoder.rs — one line in, one document out. Or a very specific complaint.
//!
//! Whether a bad line is a shrug or a showstopper is NOT decided here. The import
//! path logs it and moves on; the validation path stops the presses. The decoder
//! just reports the facts, like a good witness.

use crate::common::Document;
use crate::error::LoadError;

/// 📄 Parse one raw NDJSON line into a `Document`.
///
/// Surrounding whitespace is fine (serde_json shrugs at it). An empty line is not a
/// document, it's a `Parse` error, same as any other malformed JSON.
pub fn decode(raw_line: &str) -> Result<Document, LoadError> {
    Ok(serde_json::from_str(raw_line)?)
}

/// 📄 Same as [`decode`], straight from bytes. Invalid UTF-8 inside a line is just
/// another flavor of malformed JSON here, not an I/O catastrophe.
pub fn decode_bytes(raw_line: &[u8]) -> Result<Document, LoadError> {
    Ok(serde_json::from_slice(raw_line)?)
}

/// ✂️ Strip one trailing `\n` (and the `\r` Windows left in front of it).
pub(crate) fn trim_line_terminator(raw_line: &[u8]) -> &[u8] {
    let raw_line = raw_line.strip_suffix(b"\n").unwrap_or(raw_line);
    raw_line.strip_suffix(b"\r").unwrap_or(raw_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn the_one_where_any_json_value_is_a_document() {
        assert_eq!(decode(r#"{"title":"hello"}"#).unwrap(), json!({"title": "hello"}));
        assert_eq!(decode("[1,2,3]").unwrap(), json!([1, 2, 3]));
        assert_eq!(decode("  42  ").unwrap(), json!(42));
    }

    #[test]
    fn the_one_where_broken_json_is_a_parse_error() {
        assert!(matches!(decode(r#"{"title":"#), Err(LoadError::Parse(_))));
        assert!(matches!(decode(""), Err(LoadError::Parse(_))));
        assert!(matches!(decode("{} {}"), Err(LoadError::Parse(_))), "one value per line");
    }

    #[test]
    fn the_one_where_bytes_that_are_not_utf8_are_just_bad_json() {
        assert!(decode_bytes(b"{\"ok\":true}").is_ok());
        assert!(matches!(decode_bytes(b"{\"name\":\"\xff\xfe\"}"), Err(LoadError::Parse(_))));
    }

    #[test]
    fn the_one_where_line_endings_from_both_worlds_get_trimmed() {
        assert_eq!(trim_line_terminator(b"{}\r\n"), b"{}");
        assert_eq!(trim_line_terminator(b"{}\n"), b"{}");
        assert_eq!(trim_line_terminator(b"{}"), b"{}");
    }
}
