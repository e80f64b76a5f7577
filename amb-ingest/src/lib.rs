//! # AMB P3 ingestion runtime
//!
//! The moving parts around the frame codec:
//!
//! - [`ingest`] - the decoder TCP client: read, frame, decode, dispatch,
//!   and the periodic GET_TIME solicitation
//! - [`time`] - the shared device-time estimate, its TCP publisher and the
//!   consuming client
//! - [`heat`] - the heat/lap engine over the passings table
//! - [`db`] - pool, migrations and the query surface
//! - [`error`] - the typed error taxonomy the binaries decide exits on
//! - [`shutdown`] - cooperative cancellation joined at exit
//!
//! Two binaries sit on top: `amb-client` (ingest + time server) and
//! `amb-laps` (time client + heat engine), cooperating through the
//! database and the local time port.

pub mod db;
pub mod error;
pub mod heat;
pub mod ingest;
pub mod shutdown;
pub mod time;

pub use error::{CoreError, CoreResult};
