use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame too short: {actual} bytes (minimum {min})")]
    FrameTooShort { actual: usize, min: usize },

    #[error("missing SOR marker")]
    MissingSor,

    #[error("missing EOR marker")]
    MissingEor,

    #[error("escape sequence error")]
    Escape(#[from] amb_protocol::EscapeError),

    #[error("length mismatch: header says {header}, frame is {actual} bytes")]
    LengthMismatch { header: u16, actual: usize },

    #[error("crc mismatch: stored 0x{stored:04X}, computed 0x{computed:04X}")]
    CrcMismatch { stored: u16, computed: u16 },

    #[error(
        "truncated field 0x{id:02X}: length {expected} exceeds {remaining} remaining body bytes"
    )]
    TruncatedField {
        id: u8,
        expected: usize,
        remaining: usize,
    },

    #[error("missing required field {name} (id 0x{id:02X})")]
    MissingField { name: &'static str, id: u8 },
}

pub type DecodeResult<T> = Result<T, DecodeError>;
