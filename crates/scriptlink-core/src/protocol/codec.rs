//! Text codec for ScriptLink envelopes.
//!
//! Wire format: each transport message carries one [`Envelope`] serialized as
//! a JSON object.  Decoding is deliberately tolerant of surrounding noise —
//! some transports and launchers wrap the payload in log prefixes or stray
//! framing characters — so [`decode`] first isolates the substring between
//! the first `{` and the last `}` and only then runs the strict JSON parser.
//!
//! ```text
//! "LOG 12:00:01 {\"action\":\"greet\",...} \n"
//!               └────── isolated ──────┘
//! ```
//!
//! Inside the braces the parser is strict: invalid JSON or a missing
//! `action`, `data`, or `__metadata__` field is a [`ProtocolError`], and the
//! input is never evaluated as code.
//!
//! A stricter protocol (length-prefixed frames) would remove the need for
//! brace isolation; the transport already delivers one envelope per message,
//! so the tolerance costs one substring scan and keeps existing callers
//! working unchanged.

use thiserror::Error;

use crate::protocol::envelope::Envelope;

/// Errors that can occur while decoding or encoding an envelope.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame contains no `{` .. `}` delimited object at all.
    #[error("no JSON object delimiters in frame ({frame_len} bytes)")]
    NoObjectDelimiters {
        /// Length of the offending frame, for log context.
        frame_len: usize,
    },

    /// The isolated text is not a valid envelope: malformed JSON, or a
    /// missing/mistyped `action`, `data`, or `__metadata__` field.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes one [`Envelope`] from a raw transport frame.
///
/// Leading and trailing non-payload text is ignored; everything between the
/// first `{` and the last `}` must parse as a complete envelope.
///
/// # Errors
///
/// Returns [`ProtocolError::NoObjectDelimiters`] if the frame holds no
/// brace-delimited object, and [`ProtocolError::MalformedEnvelope`] if the
/// isolated object is not valid envelope JSON (including any missing
/// required field).
///
/// # Examples
///
/// ```rust
/// use scriptlink_core::decode;
///
/// let envelope = decode(r#"noise {"action":"greet","data":{},"__metadata__":{}} noise"#).unwrap();
/// assert_eq!(envelope.action, "greet");
/// ```
pub fn decode(raw: &str) -> Result<Envelope, ProtocolError> {
    let object = isolate_object(raw).ok_or(ProtocolError::NoObjectDelimiters {
        frame_len: raw.len(),
    })?;
    Ok(serde_json::from_str(object)?)
}

/// Encodes an [`Envelope`] into its canonical wire text.
///
/// Exactly the three logical fields are serialized; nothing about the
/// worker's internal state leaks into the output.  `decode(encode(e))`
/// yields an envelope structurally equal to `e`.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedEnvelope`] if serialization fails
/// (practically unreachable for tree-shaped `serde_json::Value` payloads).
pub fn encode(envelope: &Envelope) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(envelope)?)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Returns the substring from the first `{` through the last `}`, or `None`
/// when no such pair exists (including a `}` before the first `{`).
fn isolate_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WELL_FORMED: &str = r#"{"action":"x","data":{},"__metadata__":{}}"#;

    // ── isolate_object ───────────────────────────────────────────────────────

    #[test]
    fn test_isolate_object_returns_full_braced_span() {
        // Arrange
        let raw = format!("prefix {WELL_FORMED} suffix");

        // Act
        let isolated = isolate_object(&raw);

        // Assert
        assert_eq!(isolated, Some(WELL_FORMED));
    }

    #[test]
    fn test_isolate_object_spans_nested_objects() {
        // The last `}` belongs to the outer object, so nesting survives.
        let raw = r#"{"action":"x","data":{"inner":{"k":1}},"__metadata__":{}}"#;
        assert_eq!(isolate_object(raw), Some(raw));
    }

    #[test]
    fn test_isolate_object_no_braces_returns_none() {
        assert_eq!(isolate_object("plain text, no payload"), None);
    }

    #[test]
    fn test_isolate_object_reversed_braces_returns_none() {
        // A `}` before the only `{` is not a payload.
        assert_eq!(isolate_object("} nonsense {"), None);
    }

    // ── decode ───────────────────────────────────────────────────────────────

    #[test]
    fn test_decode_clean_frame() {
        let envelope = decode(WELL_FORMED).unwrap();
        assert_eq!(envelope.action, "x");
    }

    #[test]
    fn test_decode_is_noise_tolerant() {
        // Arrange: identical payload, three framings
        let clean = decode(WELL_FORMED).unwrap();

        // Act
        let prefixed = decode(&format!("12:00:01 worker: {WELL_FORMED}")).unwrap();
        let suffixed = decode(&format!("{WELL_FORMED}\r\n")).unwrap();
        let both = decode(&format!(">>> {WELL_FORMED} <<<")).unwrap();

        // Assert: framing noise must not change the result
        assert_eq!(clean, prefixed);
        assert_eq!(clean, suffixed);
        assert_eq!(clean, both);
    }

    #[test]
    fn test_decode_empty_frame_is_no_object_delimiters() {
        let result = decode("");
        assert!(matches!(
            result,
            Err(ProtocolError::NoObjectDelimiters { frame_len: 0 })
        ));
    }

    #[test]
    fn test_decode_braceless_frame_is_no_object_delimiters() {
        let result = decode("hello worker");
        assert!(matches!(
            result,
            Err(ProtocolError::NoObjectDelimiters { .. })
        ));
    }

    #[test]
    fn test_decode_invalid_json_is_malformed_envelope() {
        let result = decode(r#"{"action": "x", "data": }"#);
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_decode_missing_action_is_malformed_envelope() {
        // Missing `action` must be rejected, never coerced.
        let result = decode(r#"{"data":{},"__metadata__":{}}"#);
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_decode_missing_metadata_is_malformed_envelope() {
        let result = decode(r#"{"action":"x","data":{}}"#);
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_decode_plain_metadata_key_is_rejected() {
        // Only the exact wire key `__metadata__` is accepted.
        let result = decode(r#"{"action":"x","data":{},"metadata":{}}"#);
        assert!(result.is_err());
    }

    // ── encode ───────────────────────────────────────────────────────────────

    #[test]
    fn test_encode_emits_exactly_three_fields() {
        // Arrange
        let envelope = Envelope::new("greet", json!({"name": "Bob"}), json!({"id": "abc"}));

        // Act
        let text = encode(&envelope).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();

        // Assert
        let object = parsed.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert!(object.contains_key("action"));
        assert!(object.contains_key("data"));
        assert!(object.contains_key("__metadata__"));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        // Arrange
        let original = Envelope::new(
            "greet",
            json!({"name": "Alice", "age": 30, "nested": {"list": [1, 2, 3]}}),
            json!({"id": 7, "trace": "deadbeef"}),
        );

        // Act
        let text = encode(&original).unwrap();
        let decoded = decode(&text).unwrap();

        // Assert
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_round_trip_survives_string_payload_with_braces() {
        // A `}` inside a JSON string still round-trips: the isolation step
        // keys on the outermost braces of the whole frame.
        let original = Envelope::new("echo", json!({"text": "a } in a string"}), json!({}));
        let decoded = decode(&encode(&original).unwrap()).unwrap();
        assert_eq!(original, decoded);
    }
}
