const TEXTUAL_APPLICATION_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/javascript",
    "application/x-javascript",
    "application/ecmascript",
    "application/csv",
    "application/x-yaml",
    "application/yaml",
    "application/x-sh",
    "application/sql",
    "application/graphql",
    "application/x-ndjson",
];

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("content is not valid UTF-8 (first bad byte at offset {offset})")]
    InvalidUtf8 { offset: usize },
    #[error("content contains NUL bytes and looks binary")]
    Binary,
}

/// Whether a MIME type is readable as text. Parameters such as `charset`
/// are ignored.
pub fn is_textual(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("text/")
        || TEXTUAL_APPLICATION_TYPES.contains(&essence.as_str())
        || essence.ends_with("+json")
        || essence.ends_with("+xml")
}

/// Decodes downloaded bytes as UTF-8. A multi-byte sequence cut off by the
/// size cap is dropped when `truncated` is set.
pub fn decode_text(bytes: &[u8], truncated: bool) -> Result<String, DecodeError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if bytes.contains(&0) {
        return Err(DecodeError::Binary);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        // error_len() is None only when the input ends mid-sequence
        Err(e) if truncated && e.error_len().is_none() => {
            Ok(String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned())
        }
        Err(e) => Err(DecodeError::InvalidUtf8 { offset: e.valid_up_to() }),
    }
}
