//! # AMB P3 frame codec
//!
//! Turns raw decoder bytes into typed records and back.
//!
//! ## Pipeline
//!
//! ```text
//! TCP bytes ──split──▶ wire frames ──unescape/verify──▶ Frame ──TLV──▶ Record
//!                                                                       │
//!              wire frame ◀──escape/checksum── body TLVs ◀────encode────┘
//! ```
//!
//! - [`split::split_records`] / [`split::FrameSplitter`] — record boundaries
//! - [`frame::parse_frame`] / [`frame::verify_crc`] — header + CRC layer
//! - [`records::Record`] — the typed record tree, with a catch-all for
//!   unknown TORs
//! - [`encode::encode`] — the inverse path, kept beside the decoder so
//!   round-trips are expressible in-tree
//!
//! ## Example
//!
//! ```rust
//! use amb_decoder::{Decoder, Record};
//!
//! let frame = hex::decode("8e021b00294800002400010848c71d090da805008104fc0504008f")
//!     .expect("valid hex");
//!
//! let decoder = Decoder::new();
//! match decoder.decode(&frame).expect("valid frame") {
//!     Record::GetTime(rtc) => assert_eq!(rtc.rtc_time, 1592148824541000),
//!     other => panic!("expected GET_TIME, got {}", other.type_name()),
//! }
//! ```

pub mod encode;
pub mod error;
pub mod frame;
pub mod records;
pub mod split;
pub mod tlv;

pub use encode::encode;
pub use error::{DecodeError, DecodeResult};
pub use frame::{Frame, FrameHeader, parse_frame, verify_crc};
pub use records::{GetTimeRecord, PassingRecord, Record, StatusRecord, UnknownRecord};
pub use split::{FrameSplitter, split_records};
pub use tlv::{RawField, decode_fields};

use amb_protocol::RecordType;

/// Frame-to-record decoder.
///
/// CRC checking is on by default; [`Decoder::with_crc_disabled`] matches
/// firmwares that emit 0x0000 and rely on the transport.
pub struct Decoder {
    check_crc: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Self { check_crc: true }
    }

    pub fn with_crc_disabled() -> Self {
        Self { check_crc: false }
    }

    /// Decode one complete wire frame into a typed record.
    ///
    /// Unknown TORs are preserved, not rejected; malformed frames (bad
    /// escapes, length or CRC mismatch, truncated TLVs in a known record,
    /// missing required fields) are errors the caller drops locally.
    pub fn decode(&self, raw: &[u8]) -> DecodeResult<Record> {
        let frame = parse_frame(raw, self.check_crc)?;
        let (fields, truncation) = tlv::decode_fields(&frame.body);

        match RecordType::from_u16(frame.header.tor) {
            Some(tor) => {
                if let Some(error) = truncation {
                    return Err(error);
                }
                match tor {
                    RecordType::Passing => {
                        PassingRecord::from_fields(&fields).map(Record::Passing)
                    }
                    RecordType::Status => StatusRecord::from_fields(&fields).map(Record::Status),
                    RecordType::GetTime => {
                        GetTimeRecord::from_fields(&fields).map(Record::GetTime)
                    }
                }
            }
            // Unknown TOR: keep the raw body and whatever fields were
            // decodable, and report success
            None => Ok(Record::Unknown(UnknownRecord {
                tor: frame.header.tor,
                body: frame.body,
                fields,
            })),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_unknown_tor_preserves_body() {
        let record = Record::Unknown(UnknownRecord {
            tor: 0x0042,
            body: vec![0x01, 0x02, 0xAB, 0xCD],
            fields: Vec::new(),
        });
        let raw = encode(&record);

        match Decoder::new().decode(&raw).expect("unknown TOR decodes") {
            Record::Unknown(u) => {
                assert_eq!(u.tor, 0x0042);
                assert_eq!(u.body, vec![0x01, 0x02, 0xAB, 0xCD]);
                // id 0x01, length 2 happens to walk as a field
                assert_eq!(u.fields.len(), 1);
            }
            other => panic!("expected UNKNOWN, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_truncated_tlv_in_known_record_fails() {
        // A PASSING frame whose body ends inside a field value
        let record = Record::Unknown(UnknownRecord {
            tor: RecordType::Passing.to_u16(),
            body: vec![0x01, 0x04, 0xB2, 0x9B], // claims 4 bytes, has 2
            fields: Vec::new(),
        });
        let raw = encode(&record);

        let result = Decoder::new().decode(&raw);
        assert!(matches!(
            result,
            Err(DecodeError::TruncatedField { id: 0x01, .. })
        ));
    }
}
