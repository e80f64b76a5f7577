//! Frame-level parsing: unescape, header extraction, CRC verification.

use crate::error::{DecodeError, DecodeResult};
use amb_protocol::{
    EOR, MIN_FRAME_SIZE, OFFSET_BODY, OFFSET_CRC, OFFSET_FLAGS, OFFSET_LENGTH, OFFSET_SOR,
    OFFSET_TOR, OFFSET_VERSION, SOR, frame_crc, unescape_frame,
};

/// The ten-byte header of an unescaped frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    /// Unescaped length of the whole frame, SOR and EOR included
    pub length: u16,
    pub crc: u16,
    pub flags: u16,
    /// Type-of-record
    pub tor: u16,
}

/// An unescaped, header-parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    /// TLV body between the header and the EOR
    pub body: Vec<u8>,
}

/// Verify the CRC of a wire (escaped) frame.
///
/// The stored CRC is read little-endian from the unescaped header; the
/// expected value is [`frame_crc`] over the unescaped frame with the CRC
/// bytes zeroed.
pub fn verify_crc(raw: &[u8]) -> DecodeResult<()> {
    let unescaped = unescape_frame(raw)?;
    if unescaped.len() < MIN_FRAME_SIZE {
        return Err(DecodeError::FrameTooShort {
            actual: unescaped.len(),
            min: MIN_FRAME_SIZE,
        });
    }

    let stored = u16::from_le_bytes([unescaped[OFFSET_CRC], unescaped[OFFSET_CRC + 1]]);

    let mut zeroed = unescaped;
    zeroed[OFFSET_CRC] = 0x00;
    zeroed[OFFSET_CRC + 1] = 0x00;
    let computed = frame_crc(&zeroed);

    if stored != computed {
        return Err(DecodeError::CrcMismatch { stored, computed });
    }
    Ok(())
}

/// Parse a single wire frame into header and body.
///
/// `check_crc` disables CRC enforcement for firmwares that emit 0x0000 and
/// rely on the transport. The version byte is recorded, not validated.
pub fn parse_frame(raw: &[u8], check_crc: bool) -> DecodeResult<Frame> {
    if raw.len() < MIN_FRAME_SIZE {
        return Err(DecodeError::FrameTooShort {
            actual: raw.len(),
            min: MIN_FRAME_SIZE,
        });
    }
    if raw[OFFSET_SOR] != SOR {
        return Err(DecodeError::MissingSor);
    }
    if raw[raw.len() - 1] != EOR {
        return Err(DecodeError::MissingEor);
    }

    if check_crc {
        verify_crc(raw)?;
    }

    let unescaped = unescape_frame(raw)?;
    if unescaped.len() < MIN_FRAME_SIZE {
        return Err(DecodeError::FrameTooShort {
            actual: unescaped.len(),
            min: MIN_FRAME_SIZE,
        });
    }

    let header = FrameHeader {
        version: unescaped[OFFSET_VERSION],
        length: u16::from_le_bytes([unescaped[OFFSET_LENGTH], unescaped[OFFSET_LENGTH + 1]]),
        crc: u16::from_le_bytes([unescaped[OFFSET_CRC], unescaped[OFFSET_CRC + 1]]),
        flags: u16::from_le_bytes([unescaped[OFFSET_FLAGS], unescaped[OFFSET_FLAGS + 1]]),
        tor: u16::from_le_bytes([unescaped[OFFSET_TOR], unescaped[OFFSET_TOR + 1]]),
    };

    // LENGTH counts unescaped bytes, SOR and EOR included
    if header.length as usize != unescaped.len() {
        return Err(DecodeError::LengthMismatch {
            header: header.length,
            actual: unescaped.len(),
        });
    }

    let body = unescaped[OFFSET_BODY..unescaped.len() - 1].to_vec();

    Ok(Frame { header, body })
}
