//! TLV body decoding.
//!
//! A body is a run of `[id][length][value…]` triples. Values are
//! little-endian unsigned integers up to 8 bytes wide; wider or unknown
//! values stay available as raw bytes. Field-id 0x8F terminates a body
//! early.

use crate::error::DecodeError;
use amb_protocol::FIELD_TERMINATOR;
use serde::{Deserialize, Serialize};

/// A single field as it appeared in a record body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawField {
    pub id: u8,
    pub value: Vec<u8>,
}

impl RawField {
    /// The value as a little-endian unsigned integer, for widths up to 8.
    pub fn uint(&self) -> Option<u64> {
        uint_le(&self.value)
    }

    /// Canonical hex rendition: most significant byte first.
    pub fn hex(&self) -> String {
        self.value
            .iter()
            .rev()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Decode a little-endian unsigned integer of up to 8 bytes.
pub fn uint_le(bytes: &[u8]) -> Option<u64> {
    if bytes.len() > 8 {
        return None;
    }

    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf))
}

/// Walk the TLV triples of a body.
///
/// Stops cleanly at the 0x8F terminator. A malformed length aborts the walk;
/// the fields extracted up to that point are returned alongside the error so
/// callers can keep what was decodable.
pub fn decode_fields(body: &[u8]) -> (Vec<RawField>, Option<DecodeError>) {
    let mut fields = Vec::new();
    let mut pos = 0;

    while pos < body.len() {
        let id = body[pos];
        if id == FIELD_TERMINATOR {
            break;
        }

        if pos + 2 > body.len() {
            return (
                fields,
                Some(DecodeError::TruncatedField {
                    id,
                    expected: 1,
                    remaining: 0,
                }),
            );
        }

        let length = body[pos + 1] as usize;
        if pos + 2 + length > body.len() {
            return (
                fields,
                Some(DecodeError::TruncatedField {
                    id,
                    expected: length,
                    remaining: body.len() - pos - 2,
                }),
            );
        }

        fields.push(RawField {
            id,
            value: body[pos + 2..pos + 2 + length].to_vec(),
        });
        pos += 2 + length;
    }

    (fields, None)
}

/// Encode fields back into body bytes, the exact inverse of
/// [`decode_fields`] for well-formed input.
pub fn encode_fields(fields: &[RawField]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in fields {
        body.push(field.id);
        body.push(field.value.len() as u8);
        body.extend_from_slice(&field.value);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple_body() {
        let body = [0x01, 0x02, 0x34, 0x12, 0x03, 0x01, 0xFF];
        let (fields, error) = decode_fields(&body);

        assert!(error.is_none());
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].id, 0x01);
        assert_eq!(fields[0].uint(), Some(0x1234));
        assert_eq!(fields[1].id, 0x03);
        assert_eq!(fields[1].uint(), Some(0xFF));
    }

    #[test]
    fn test_terminator_stops_walk() {
        let body = [0x01, 0x01, 0x05, 0x8F, 0xDE, 0xAD];
        let (fields, error) = decode_fields(&body);

        assert!(error.is_none());
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_truncated_value_preserves_extracted_fields() {
        // Second field claims 4 bytes but only 1 remains
        let body = [0x01, 0x01, 0x05, 0x03, 0x04, 0xAA];
        let (fields, error) = decode_fields(&body);

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].uint(), Some(0x05));
        assert_eq!(
            error,
            Some(DecodeError::TruncatedField {
                id: 0x03,
                expected: 4,
                remaining: 1
            })
        );
    }

    #[test]
    fn test_truncated_header() {
        // Field id with no length byte
        let body = [0x01];
        let (fields, error) = decode_fields(&body);

        assert!(fields.is_empty());
        assert!(matches!(
            error,
            Some(DecodeError::TruncatedField { id: 0x01, .. })
        ));
    }

    #[test]
    fn test_uint_le_widths() {
        assert_eq!(uint_le(&[]), Some(0));
        assert_eq!(uint_le(&[0x2A]), Some(42));
        assert_eq!(uint_le(&[0x34, 0x12]), Some(0x1234));
        assert_eq!(uint_le(&[0x78, 0x56, 0x34, 0x12]), Some(0x12345678));
        assert_eq!(
            uint_le(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80]),
            Some(0x8000000000000001)
        );
        assert_eq!(uint_le(&[0; 9]), None);
    }

    #[test]
    fn test_hex_is_most_significant_first() {
        let field = RawField {
            id: 0x04,
            value: vec![0xE8, 0x19, 0xE6, 0xBD],
        };
        assert_eq!(field.hex(), "bde619e8");
    }

    #[test]
    fn test_encode_decode_inverse() {
        let fields = vec![
            RawField {
                id: 0x01,
                value: vec![0x01, 0x02, 0x03, 0x04],
            },
            RawField {
                id: 0x81,
                value: vec![0xFC, 0x05, 0x04, 0x00],
            },
        ];

        let body = encode_fields(&fields);
        let (decoded, error) = decode_fields(&body);

        assert!(error.is_none());
        assert_eq!(decoded, fields);
    }
}
