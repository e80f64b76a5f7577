//! The clock-synchronization service.
//!
//! [`clock::DecoderTime`] holds the last device-reported RTC paired with a
//! monotonic anchor; reads advance with elapsed time and never go backwards
//! between corrections. [`server::TimeServer`] publishes the estimate as
//! ASCII lines on a local TCP port; [`client::TimeClient`] consumes that
//! stream in other processes.

pub mod client;
pub mod clock;
pub mod server;

pub use client::{TimeClient, parse_time_line};
pub use clock::DecoderTime;
pub use server::TimeServer;

use std::time::Duration;

/// Local address the time server binds by default.
pub const DEFAULT_TIME_ADDR: &str = "127.0.0.1";

/// Local port the time server binds by default.
pub const DEFAULT_TIME_PORT: u16 = 9999;

/// Interval between published time lines.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_millis(500);
