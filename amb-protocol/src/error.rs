use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EscapeError {
    #[error("frame too short to carry SOR and EOR ({0} bytes)")]
    FrameTooShort(usize),

    #[error("incomplete escape sequence: escape byte at end of frame interior")]
    IncompleteSequence,

    #[error("invalid escape sequence: 0x8D followed by 0x{0:02X} (expected 0xAD-0xAF)")]
    InvalidSequence(u8),
}
