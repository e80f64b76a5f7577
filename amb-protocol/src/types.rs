/// Protocol constants for the AMB P3 frame structure.

/// Start of Record - marks the beginning of a frame
pub const SOR: u8 = 0x8E;

/// End of Record - marks the end of a frame
pub const EOR: u8 = 0x8F;

/// Escape byte - prefixes a control byte appearing inside frame data
pub const ESC: u8 = 0x8D;

/// Value added to escaped bytes (escape mechanism)
pub const ESCAPE_OFFSET: u8 = 0x20;

/// Protocol version emitted by the decoders observed in captures
pub const VERSION: u8 = 0x02;

/// Field-id that terminates a TLV body early
pub const FIELD_TERMINATOR: u8 = 0x8F;

/// Field-ids at or above this value resolve from the shared general table
pub const GENERAL_FIELD_BASE: u8 = 0x80;

// Frame layout (unescaped):
//
// ┌──────┬─────────┬────────┬─────────┬─────────┬─────────┬──────────┬──────┐
// │ SOR  │ VERSION │ LENGTH │   CRC   │  FLAGS  │   TOR   │   BODY   │ EOR  │
// │ 0x8E │ 1 byte  │ 2 LE   │  2 LE   │  2 LE   │  2 LE   │ variable │ 0x8F │
// └──────┴─────────┴────────┴─────────┴─────────┴─────────┴──────────┴──────┘

/// Byte offset of SOR in an unescaped frame
pub const OFFSET_SOR: usize = 0;

/// Byte offset of the version byte
pub const OFFSET_VERSION: usize = 1;

/// Byte offset of the LENGTH field (2 bytes, little-endian)
pub const OFFSET_LENGTH: usize = 2;

/// Byte offset of the CRC field (2 bytes, little-endian)
pub const OFFSET_CRC: usize = 4;

/// Byte offset of the FLAGS field (2 bytes, little-endian)
pub const OFFSET_FLAGS: usize = 6;

/// Byte offset of the TOR (type-of-record) field (2 bytes, little-endian)
pub const OFFSET_TOR: usize = 8;

/// Byte offset where the TLV body starts
pub const OFFSET_BODY: usize = 10;

/// Total header size (SOR + VERSION + LENGTH + CRC + FLAGS + TOR)
pub const HEADER_SIZE: usize = 10;

/// Minimum valid frame size (header + EOR)
pub const MIN_FRAME_SIZE: usize = 11;

/// The literal GET_TIME solicitation written to the decoder.
///
/// This exact byte sequence (escapes, CRC and all) is what the decoder
/// answers with a GET_TIME record; it is sent verbatim rather than built
/// through the encoder.
pub const GET_TIME_REQUEST: [u8; 17] = [
    0x8E, 0x00, 0x00, 0x00, 0x5B, 0xEB, 0x00, 0x00, 0x24, 0x00, 0x01, 0x00, 0x04, 0x00, 0x05,
    0x00, 0x8F,
];

/// Type of Record (TOR) values recognized by the decoder pipeline.
///
/// TORs outside this set are preserved as opaque records, not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RecordType {
    /// Transponder detection with timing data
    Passing = 0x0001,

    /// Decoder operational status
    Status = 0x0002,

    /// Decoder real-time clock report
    GetTime = 0x0024,
}

impl RecordType {
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(RecordType::Passing),
            0x0002 => Some(RecordType::Status),
            0x0024 => Some(RecordType::GetTime),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordType::Passing => "PASSING",
            RecordType::Status => "STATUS",
            RecordType::GetTime => "GET_TIME",
        }
    }
}

impl From<RecordType> for u16 {
    fn from(tor: RecordType) -> Self {
        tor.to_u16()
    }
}
