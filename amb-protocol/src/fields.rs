//! TLV field-id tables for P3 record bodies.
//!
//! Each record body is a run of fields encoded as
//! `[id: 1 byte][length: 1 byte][value: length bytes, little-endian]`.
//! Ids below 0x80 are record-specific; ids at or above 0x80 come from the
//! shared general table. 0x8F terminates a body early.

use crate::types::{GENERAL_FIELD_BASE, RecordType};

/// PASSING record field ids
pub mod passing {
    /// Decoder-assigned sequential passing number (u32)
    pub const PASSING_NUMBER: u8 = 0x01;

    /// Transponder id (u32)
    pub const TRANSPONDER: u8 = 0x03;

    /// Decoder RTC time in microseconds (u64)
    pub const RTC_TIME: u8 = 0x04;

    /// Signal strength, 0-1023 (u16)
    pub const STRENGTH: u8 = 0x05;

    /// Number of detection hits, 1-6 (u16)
    pub const HITS: u8 = 0x06;

    /// Passing flags (u16)
    pub const FLAGS: u8 = 0x08;

    /// GPS-synchronized UTC time in microseconds (u64), firmware-dependent
    pub const UTC_TIME: u8 = 0x10;
}

/// STATUS record field ids
pub mod status {
    /// Background noise level (u16)
    pub const NOISE: u8 = 0x01;

    /// GPS lock status (u8)
    pub const GPS: u8 = 0x06;

    /// Temperature reading (u16)
    pub const TEMPERATURE: u8 = 0x07;

    /// Loop trigger counter (u16)
    pub const LOOP_TRIGGERS: u8 = 0x0B;

    /// Input voltage reading (u8)
    pub const INPUT_VOLTAGE: u8 = 0x0C;
}

/// GET_TIME record field ids
pub mod get_time {
    /// Decoder RTC time in microseconds. Observed as 4 or 8 bytes wide
    /// depending on firmware; both decode.
    pub const RTC_TIME: u8 = 0x01;
}

/// General field ids (0x80 and above), shared by every record type
pub mod general {
    /// Decoder id / serial number (u32)
    pub const DECODER_ID: u8 = 0x81;
}

/// Whether a field id resolves from the shared general table.
#[inline]
pub fn is_general(id: u8) -> bool {
    id >= GENERAL_FIELD_BASE
}

/// Look up a general field id (0x80 and above), valid for any record type.
pub fn general_field_name(id: u8) -> Option<&'static str> {
    match id {
        general::DECODER_ID => Some("DECODER_ID"),
        _ => None,
    }
}

/// Look up the name of a field id within a record type.
///
/// General ids resolve regardless of record type; unknown ids return `None`
/// and are surfaced as `UNDECODED_<hex>` at the serialization boundary.
pub fn field_name(tor: RecordType, id: u8) -> Option<&'static str> {
    if is_general(id) {
        return general_field_name(id);
    }

    match tor {
        RecordType::Passing => match id {
            passing::PASSING_NUMBER => Some("PASSING_NUMBER"),
            passing::TRANSPONDER => Some("TRANSPONDER"),
            passing::RTC_TIME => Some("RTC_TIME"),
            passing::STRENGTH => Some("STRENGTH"),
            passing::HITS => Some("HITS"),
            passing::FLAGS => Some("FLAGS"),
            passing::UTC_TIME => Some("UTC_TIME"),
            _ => None,
        },
        RecordType::Status => match id {
            status::NOISE => Some("NOISE"),
            status::GPS => Some("GPS"),
            status::TEMPERATURE => Some("TEMPERATURE"),
            status::LOOP_TRIGGERS => Some("LOOP_TRIGGERS"),
            status::INPUT_VOLTAGE => Some("INPUT_VOLTAGE"),
            _ => None,
        },
        RecordType::GetTime => match id {
            get_time::RTC_TIME => Some("RTC_TIME"),
            _ => None,
        },
    }
}
