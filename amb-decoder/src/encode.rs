//! The inverse codec: typed records back to wire frames.
//!
//! Frame assembly mirrors decoding exactly: header with a zeroed CRC
//! placeholder, TLV body in table order, EOR, [`frame_crc`] patched into the
//! header, escape stuffing applied over the interior. `decode(encode(r))`
//! is the identity for the defined field set.

use crate::records::{GetTimeRecord, PassingRecord, Record, StatusRecord};
use crate::tlv::RawField;
use amb_protocol::fields::{general, get_time, passing, status};
use amb_protocol::{
    EOR, HEADER_SIZE, OFFSET_CRC, RecordType, SOR, VERSION, escape_frame, frame_crc,
};

/// TLV body builder.
struct TlvWriter {
    buf: Vec<u8>,
}

impl TlvWriter {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn add_uint(mut self, id: u8, width: u8, value: u64) -> Self {
        self.buf.push(id);
        self.buf.push(width);
        self.buf
            .extend_from_slice(&value.to_le_bytes()[..width as usize]);
        self
    }

    fn add_u16(self, id: u8, value: u16) -> Self {
        self.add_uint(id, 2, value as u64)
    }

    fn add_u32(self, id: u8, value: u32) -> Self {
        self.add_uint(id, 4, value as u64)
    }

    fn add_u64(self, id: u8, value: u64) -> Self {
        self.add_uint(id, 8, value)
    }

    fn add_u8(self, id: u8, value: u8) -> Self {
        self.add_uint(id, 1, value as u64)
    }

    fn add_optional_u32(self, id: u8, value: Option<u32>) -> Self {
        match value {
            Some(v) => self.add_u32(id, v),
            None => self,
        }
    }

    fn add_optional_u64(self, id: u8, value: Option<u64>) -> Self {
        match value {
            Some(v) => self.add_u64(id, v),
            None => self,
        }
    }

    fn add_raw(mut self, fields: &[RawField]) -> Self {
        for field in fields {
            self.buf.push(field.id);
            self.buf.push(field.value.len() as u8);
            self.buf.extend_from_slice(&field.value);
        }
        self
    }

    fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// Encode a record into a complete wire frame.
pub fn encode(record: &Record) -> Vec<u8> {
    match record {
        Record::Passing(r) => build_frame(RecordType::Passing.to_u16(), passing_body(r)),
        Record::Status(r) => build_frame(RecordType::Status.to_u16(), status_body(r)),
        Record::GetTime(r) => build_frame(RecordType::GetTime.to_u16(), get_time_body(r)),
        Record::Unknown(r) => build_frame(r.tor, r.body.clone()),
    }
}

fn passing_body(r: &PassingRecord) -> Vec<u8> {
    TlvWriter::new()
        .add_u32(passing::PASSING_NUMBER, r.passing_number)
        .add_u32(passing::TRANSPONDER, r.transponder)
        .add_u64(passing::RTC_TIME, r.rtc_time)
        .add_u16(passing::STRENGTH, r.strength)
        .add_u16(passing::HITS, r.hits)
        .add_u16(passing::FLAGS, r.flags)
        .add_optional_u64(passing::UTC_TIME, r.utc_time)
        .add_optional_u32(general::DECODER_ID, r.decoder_id)
        .add_raw(&r.undecoded)
        .build()
}

fn status_body(r: &StatusRecord) -> Vec<u8> {
    TlvWriter::new()
        .add_u16(status::NOISE, r.noise)
        .add_u8(status::GPS, r.gps)
        .add_u16(status::TEMPERATURE, r.temperature)
        .add_u16(status::LOOP_TRIGGERS, r.loop_triggers)
        .add_u8(status::INPUT_VOLTAGE, r.input_voltage)
        .add_optional_u32(general::DECODER_ID, r.decoder_id)
        .add_raw(&r.undecoded)
        .build()
}

fn get_time_body(r: &GetTimeRecord) -> Vec<u8> {
    // The 8-byte rendition; decode accepts 4 as well
    TlvWriter::new()
        .add_u64(get_time::RTC_TIME, r.rtc_time)
        .add_optional_u32(general::DECODER_ID, r.decoder_id)
        .add_raw(&r.undecoded)
        .build()
}

/// Assemble, checksum and escape a complete frame around a TLV body.
fn build_frame(tor: u16, body: Vec<u8>) -> Vec<u8> {
    let length = (HEADER_SIZE + body.len() + 1) as u16;

    let mut frame = Vec::with_capacity(length as usize);
    frame.push(SOR);
    frame.push(VERSION);
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&[0x00, 0x00]); // CRC placeholder
    frame.extend_from_slice(&[0x00, 0x00]); // FLAGS
    frame.extend_from_slice(&tor.to_le_bytes());
    frame.extend_from_slice(&body);
    frame.push(EOR);

    let crc = frame_crc(&frame);
    frame[OFFSET_CRC..OFFSET_CRC + 2].copy_from_slice(&crc.to_le_bytes());

    escape_frame(&frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::verify_crc;
    use crate::records::UnknownRecord;

    fn sample_get_time() -> Record {
        Record::GetTime(GetTimeRecord {
            rtc_time: 1592148824541000,
            decoder_id: Some(263676),
            undecoded: Vec::new(),
        })
    }

    #[test]
    fn test_encode_get_time_golden() {
        let frame = encode(&sample_get_time());
        assert_eq!(
            hex::encode(&frame),
            "8e021b00294800002400010848c71d090da805008104fc0504008f"
        );
    }

    #[test]
    fn test_encode_status_golden() {
        let record = Record::Status(StatusRecord {
            noise: 59,
            gps: 1,
            temperature: 21,
            loop_triggers: 3,
            input_voltage: 122,
            decoder_id: Some(263676),
            undecoded: Vec::new(),
        });

        assert_eq!(
            hex::encode(encode(&record)),
            "8e02230032760000020001023b00060101070215000b0203000c017a8104fc0504008f"
        );
    }

    #[test]
    fn test_encode_passing_golden() {
        let record = Record::Passing(PassingRecord {
            passing_number: 105394,
            transponder: 7404583,
            rtc_time: 1255138658753000,
            strength: 51,
            hits: 16,
            flags: 0,
            utc_time: None,
            decoder_id: Some(263676),
            undecoded: Vec::new(),
        });

        assert_eq!(
            hex::encode(encode(&record)),
            "8e023300c4d1000001000104b29b0100030427fc70000408e819e6bd8a7504000502330006021000080200008104fc0504008f"
        );
    }

    #[test]
    fn test_encoded_rtc_with_control_bytes_is_escaped() {
        // RTC chosen so its little-endian bytes contain 0x8D, 0x8E and 0x8F
        let record = Record::GetTime(GetTimeRecord {
            rtc_time: 1565217297268737,
            decoder_id: Some(263676),
            undecoded: Vec::new(),
        });

        let frame = encode(&record);
        assert_eq!(
            hex::encode(&frame),
            "8e021b00a8cd0000240001080100008dad8dae8daf05008104fc0504008f"
        );
        verify_crc(&frame).expect("escaped frame carries a valid crc");
    }

    #[test]
    fn test_every_encoded_frame_verifies() {
        for record in [
            sample_get_time(),
            Record::Unknown(UnknownRecord {
                tor: 0x0042,
                body: vec![0x01, 0x02, 0xAB, 0xCD],
                fields: Vec::new(),
            }),
        ] {
            verify_crc(&encode(&record)).expect("encoder output verifies");
        }
    }
}
