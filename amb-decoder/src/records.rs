//! Typed record tree.
//!
//! Each recognized TOR decodes into a struct of named fields; everything
//! else is preserved in a catch-all variant carrying the raw body together
//! with whatever TLV fields were opportunistically decodable. Unrecognized
//! field ids inside known records are kept as raw fields and surface as
//! `UNDECODED_<hex>` entries at the serialization boundary.

use crate::error::{DecodeError, DecodeResult};
use crate::tlv::RawField;
use amb_protocol::fields::{field_name, general, general_field_name, get_time, passing, status};
use amb_protocol::{FIELD_TERMINATOR, RecordType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

fn require<T>(value: Option<T>, name: &'static str, id: u8) -> DecodeResult<T> {
    value.ok_or(DecodeError::MissingField { name, id })
}

/// A transponder detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassingRecord {
    /// Decoder-assigned sequential passing number
    pub passing_number: u32,

    /// Transponder id
    pub transponder: u32,

    /// Decoder RTC time in microseconds
    pub rtc_time: u64,

    /// Signal strength (0-1023)
    pub strength: u16,

    /// Detection hits (1-6)
    pub hits: u16,

    /// Passing flags
    pub flags: u16,

    /// GPS-synchronized UTC time, when the firmware provides it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_time: Option<u64>,

    /// Decoder id from the general field table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoder_id: Option<u32>,

    /// Fields with ids outside the PASSING table, preserved as-is
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub undecoded: Vec<RawField>,
}

/// A decoder health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub noise: u16,
    pub gps: u8,
    pub temperature: u16,
    pub loop_triggers: u16,
    pub input_voltage: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoder_id: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub undecoded: Vec<RawField>,
}

/// A decoder clock report, answering the GET_TIME solicitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTimeRecord {
    /// Decoder RTC in microseconds; the wire field is 4 or 8 bytes wide
    /// depending on firmware, both accepted
    pub rtc_time: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoder_id: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub undecoded: Vec<RawField>,
}

/// A record whose TOR is not in the table: raw body preserved, fields
/// decoded opportunistically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownRecord {
    pub tor: u16,
    pub body: Vec<u8>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<RawField>,
}

/// Any decoded record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record_type")]
pub enum Record {
    #[serde(rename = "PASSING")]
    Passing(PassingRecord),

    #[serde(rename = "STATUS")]
    Status(StatusRecord),

    #[serde(rename = "GET_TIME")]
    GetTime(GetTimeRecord),

    #[serde(rename = "UNKNOWN")]
    Unknown(UnknownRecord),
}

impl PassingRecord {
    pub fn from_fields(fields: &[RawField]) -> DecodeResult<Self> {
        let mut passing_number = None;
        let mut transponder = None;
        let mut rtc_time = None;
        let mut strength = None;
        let mut hits = None;
        let mut flags = None;
        let mut utc_time = None;
        let mut decoder_id = None;
        let mut undecoded = Vec::new();

        for field in fields {
            match field.id {
                passing::PASSING_NUMBER => passing_number = field.uint().map(|v| v as u32),
                passing::TRANSPONDER => transponder = field.uint().map(|v| v as u32),
                passing::RTC_TIME => rtc_time = field.uint(),
                passing::STRENGTH => strength = field.uint().map(|v| v as u16),
                passing::HITS => hits = field.uint().map(|v| v as u16),
                passing::FLAGS => flags = field.uint().map(|v| v as u16),
                passing::UTC_TIME => utc_time = field.uint(),
                general::DECODER_ID => decoder_id = field.uint().map(|v| v as u32),
                _ => undecoded.push(field.clone()),
            }
        }

        Ok(PassingRecord {
            passing_number: require(passing_number, "PASSING_NUMBER", passing::PASSING_NUMBER)?,
            transponder: require(transponder, "TRANSPONDER", passing::TRANSPONDER)?,
            rtc_time: require(rtc_time, "RTC_TIME", passing::RTC_TIME)?,
            strength: require(strength, "STRENGTH", passing::STRENGTH)?,
            hits: require(hits, "HITS", passing::HITS)?,
            flags: require(flags, "FLAGS", passing::FLAGS)?,
            utc_time,
            decoder_id,
            undecoded,
        })
    }
}

impl StatusRecord {
    pub fn from_fields(fields: &[RawField]) -> DecodeResult<Self> {
        let mut noise = None;
        let mut gps = None;
        let mut temperature = None;
        let mut loop_triggers = None;
        let mut input_voltage = None;
        let mut decoder_id = None;
        let mut undecoded = Vec::new();

        for field in fields {
            match field.id {
                status::NOISE => noise = field.uint().map(|v| v as u16),
                status::GPS => gps = field.uint().map(|v| v as u8),
                status::TEMPERATURE => temperature = field.uint().map(|v| v as u16),
                status::LOOP_TRIGGERS => loop_triggers = field.uint().map(|v| v as u16),
                status::INPUT_VOLTAGE => input_voltage = field.uint().map(|v| v as u8),
                general::DECODER_ID => decoder_id = field.uint().map(|v| v as u32),
                _ => undecoded.push(field.clone()),
            }
        }

        Ok(StatusRecord {
            noise: require(noise, "NOISE", status::NOISE)?,
            gps: require(gps, "GPS", status::GPS)?,
            temperature: require(temperature, "TEMPERATURE", status::TEMPERATURE)?,
            loop_triggers: require(loop_triggers, "LOOP_TRIGGERS", status::LOOP_TRIGGERS)?,
            input_voltage: require(input_voltage, "INPUT_VOLTAGE", status::INPUT_VOLTAGE)?,
            decoder_id,
            undecoded,
        })
    }
}

impl GetTimeRecord {
    pub fn from_fields(fields: &[RawField]) -> DecodeResult<Self> {
        let mut rtc_time = None;
        let mut decoder_id = None;
        let mut undecoded = Vec::new();

        for field in fields {
            match field.id {
                get_time::RTC_TIME => rtc_time = field.uint(),
                general::DECODER_ID => decoder_id = field.uint().map(|v| v as u32),
                _ => undecoded.push(field.clone()),
            }
        }

        Ok(GetTimeRecord {
            rtc_time: require(rtc_time, "RTC_TIME", get_time::RTC_TIME)?,
            decoder_id,
            undecoded,
        })
    }
}

impl Record {
    pub fn type_name(&self) -> &'static str {
        match self {
            Record::Passing(_) => RecordType::Passing.name(),
            Record::Status(_) => RecordType::Status.name(),
            Record::GetTime(_) => RecordType::GetTime.name(),
            Record::Unknown(_) => "UNKNOWN",
        }
    }

    /// Render the record as a field-name → value map for logging and
    /// export. Known fields use their table names as integers; preserved
    /// raw fields appear as `UNDECODED_<hex id>` with the value hex-encoded
    /// most-significant-byte first.
    pub fn to_field_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("TOR".into(), json!(self.type_name()));

        match self {
            Record::Passing(r) => {
                map.insert("PASSING_NUMBER".into(), json!(r.passing_number));
                map.insert("TRANSPONDER".into(), json!(r.transponder));
                map.insert("RTC_TIME".into(), json!(r.rtc_time));
                map.insert("STRENGTH".into(), json!(r.strength));
                map.insert("HITS".into(), json!(r.hits));
                map.insert("FLAGS".into(), json!(r.flags));
                if let Some(utc) = r.utc_time {
                    map.insert("UTC_TIME".into(), json!(utc));
                }
                if let Some(id) = r.decoder_id {
                    map.insert("DECODER_ID".into(), json!(id));
                }
                insert_undecoded(&mut map, &r.undecoded);
            }
            Record::Status(r) => {
                map.insert("NOISE".into(), json!(r.noise));
                map.insert("GPS".into(), json!(r.gps));
                map.insert("TEMPERATURE".into(), json!(r.temperature));
                map.insert("LOOP_TRIGGERS".into(), json!(r.loop_triggers));
                map.insert("INPUT_VOLTAGE".into(), json!(r.input_voltage));
                if let Some(id) = r.decoder_id {
                    map.insert("DECODER_ID".into(), json!(id));
                }
                insert_undecoded(&mut map, &r.undecoded);
            }
            Record::GetTime(r) => {
                map.insert("RTC_TIME".into(), json!(r.rtc_time));
                if let Some(id) = r.decoder_id {
                    map.insert("DECODER_ID".into(), json!(id));
                }
                insert_undecoded(&mut map, &r.undecoded);
            }
            Record::Unknown(r) => {
                map.insert("TOR_RAW".into(), json!(format!("{:04x}", r.tor)));
                map.insert(
                    "undecoded_tor_body".into(),
                    json!(r.body.iter().map(|b| format!("{:02x}", b)).collect::<String>()),
                );
                for field in &r.fields {
                    // General ids keep their names even under an unknown TOR
                    let label = general_field_name(field.id)
                        .or_else(|| {
                            RecordType::from_u16(r.tor).and_then(|tor| field_name(tor, field.id))
                        })
                        .map(String::from)
                        .unwrap_or_else(|| format!("UNDECODED_{:02x}", field.id));
                    map.insert(label, json!(field.hex()));
                }
            }
        }

        map
    }
}

fn insert_undecoded(map: &mut Map<String, Value>, fields: &[RawField]) {
    for field in fields {
        // The terminator id never reaches here; the TLV walk consumes it
        debug_assert_ne!(field.id, FIELD_TERMINATOR);
        map.insert(format!("UNDECODED_{:02x}", field.id), json!(field.hex()));
    }
}
