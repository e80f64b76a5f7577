//! Error taxonomy of the ingestion core.
//!
//! Malformed frames are constructed as [`CoreError::Frame`] but recovered
//! locally in the ingest loop (dropped with a diagnostic); unknown records
//! are values ([`amb_decoder::Record::Unknown`]), never errors. What crosses
//! a component boundary is transport state, persistence faults and fatal
//! configuration - the collaborator owning the process decides what exits.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed frame (escape, length, CRC or TLV fault). Handled at the
    /// point of decode; does not cross the ingest loop.
    #[error("malformed frame: {0}")]
    Frame(#[from] amb_decoder::DecodeError),

    /// Socket-level failure: connect refused/timed out, read or write error.
    #[error("transport: {0}")]
    Transport(#[source] std::io::Error),

    /// The peer closed the connection (zero-length read). Recoverable by
    /// reconnecting.
    #[error("decoder closed the connection")]
    PeerClosed,

    /// Database fault that survived the bounded retry protocol.
    #[error("persistence: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Missing or unusable configuration, including persistent failure to
    /// obtain an initial device clock. Fatal to the process.
    #[error("configuration: {0}")]
    Config(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
