//! The shared device-time estimate.

use std::sync::Mutex;
use std::time::Instant;

struct Anchor {
    rtc_us: u64,
    anchor: Instant,
}

/// Device time as `(rtc_microseconds, monotonic_anchor)`.
///
/// Reads return `rtc + (now - anchor)`; a correction replaces both fields
/// under one lock, so readers never observe a mixed pair. An RTC of zero
/// means "no clock yet" - reads return 0 until the first correction, and
/// consumers wait on that.
pub struct DecoderTime {
    inner: Mutex<Anchor>,
}

impl DecoderTime {
    pub fn new(rtc_us: u64) -> Self {
        Self {
            inner: Mutex::new(Anchor {
                rtc_us,
                anchor: Instant::now(),
            }),
        }
    }

    /// A clock that has not yet received a device report.
    pub fn unset() -> Self {
        Self::new(0)
    }

    /// Apply a correction: replace RTC and anchor atomically.
    pub fn set(&self, rtc_us: u64) {
        let mut inner = self.lock();
        inner.rtc_us = rtc_us;
        inner.anchor = Instant::now();
    }

    /// Drop back to the unset state (a garbled time line was received).
    pub fn reset(&self) {
        self.set(0);
    }

    /// The current estimate in microseconds, 0 while unset.
    pub fn now_us(&self) -> u64 {
        let inner = self.lock();
        if inner.rtc_us == 0 {
            return 0;
        }
        inner.rtc_us + inner.anchor.elapsed().as_micros() as u64
    }

    pub fn is_set(&self) -> bool {
        self.lock().rtc_us != 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Anchor> {
        // A poisoned lock still holds a consistent pair; keep serving it
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unset_reads_zero() {
        let clock = DecoderTime::unset();
        assert!(!clock.is_set());
        assert_eq!(clock.now_us(), 0);
    }

    #[test]
    fn test_estimate_advances_with_elapsed_time() {
        let clock = DecoderTime::new(1_000_000_000);
        std::thread::sleep(Duration::from_millis(2));

        let now = clock.now_us();
        assert!(now >= 1_000_002_000, "estimate {} lags real time", now);
        // generous slack for a loaded test machine
        assert!(now <= 1_000_002_000 + 50_000, "estimate {} ran ahead", now);
    }

    #[test]
    fn test_reads_never_decrease_between_corrections() {
        let clock = DecoderTime::new(5_000_000);
        let mut previous = clock.now_us();
        for _ in 0..100 {
            let current = clock.now_us();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_correction_replaces_pair() {
        let clock = DecoderTime::new(1_000_000);
        clock.set(9_000_000);
        let now = clock.now_us();
        assert!(now >= 9_000_000);
        assert!(now < 10_000_000);
    }

    #[test]
    fn test_reset_returns_to_unset() {
        let clock = DecoderTime::new(1_000_000);
        clock.reset();
        assert_eq!(clock.now_us(), 0);
        assert!(!clock.is_set());
    }
}
