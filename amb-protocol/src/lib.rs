//! # AMB P3 protocol core
//!
//! Low-level definitions for the AMB P3 lap-decoder binary protocol.
//!
//! ## What this library provides
//!
//! - **Frame constants** (SOR, EOR, ESC, header offsets)
//! - **Record types** (PASSING, STATUS, GET_TIME)
//! - **TLV field-id tables** for all record types
//! - **Escape/unescape** for control bytes inside a frame
//! - **CRC-16 calculation** including the wire byte-swap
//!
//! ## What this library does NOT provide
//!
//! - Frame parsing and encoding (see the `amb-decoder` crate)
//! - I/O of any kind (TCP, database)
//!
//! This is a pure logic library with zero I/O dependencies.
//!
//! ## Example
//!
//! ```rust
//! use amb_protocol::{RecordType, SOR, EOR, ESC};
//! use amb_protocol::fields::passing;
//!
//! assert_eq!(SOR, 0x8E);
//! assert_eq!(EOR, 0x8F);
//! assert_eq!(ESC, 0x8D);
//!
//! assert_eq!(RecordType::Passing.to_u16(), 0x0001);
//! assert_eq!(passing::TRANSPONDER, 0x03);
//! ```

pub mod crc;
pub mod error;
pub mod escape;
pub mod fields;
pub mod types;

pub use crc::{crc16, frame_crc};
pub use error::EscapeError;
pub use escape::{escape_frame, needs_escape, unescape_frame};
pub use types::*;
