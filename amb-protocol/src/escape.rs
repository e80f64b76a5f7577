//! Escape handling for control bytes inside a frame.
//!
//! The control bytes SOR (0x8E), EOR (0x8F) and ESC (0x8D) may only appear
//! literally at a frame's boundaries. Inside the interior each occurrence is
//! written as ESC followed by the value plus 0x20:
//!
//! `0x8F → [0x8D, 0xAF]`
//!
//! The LENGTH field of the header counts unescaped bytes; escape bytes are a
//! wire-only artifact.

use crate::error::EscapeError;
use crate::types::{EOR, ESC, ESCAPE_OFFSET, SOR};

/// Whether a byte must be escaped when it appears inside a frame interior.
#[inline]
pub fn needs_escape(byte: u8) -> bool {
    byte == ESC || byte == SOR || byte == EOR
}

/// Apply escape stuffing to a complete unescaped frame.
///
/// The first byte (SOR) and last byte (EOR) pass through untouched; every
/// interior control byte becomes a two-byte escape sequence. The inverse of
/// [`unescape_frame`].
pub fn escape_frame(frame: &[u8]) -> Vec<u8> {
    if frame.len() < 2 {
        return frame.to_vec();
    }

    let interior = &frame[1..frame.len() - 1];
    let mut escaped = Vec::with_capacity(frame.len());

    escaped.push(frame[0]);
    for &byte in interior {
        if needs_escape(byte) {
            escaped.push(ESC);
            escaped.push(byte.wrapping_add(ESCAPE_OFFSET));
        } else {
            escaped.push(byte);
        }
    }
    escaped.push(frame[frame.len() - 1]);

    escaped
}

/// Remove escape stuffing from a complete wire frame.
///
/// The first and last bytes are preserved; inside the interior each ESC
/// (0x8D) consumes the following byte, which must be in 0xAD..=0xAF, and
/// emits that byte minus 0x20.
///
/// # Errors
/// [`EscapeError::IncompleteSequence`] when an ESC is the last interior
/// byte (escape underflow), [`EscapeError::InvalidSequence`] when the byte
/// after an ESC falls outside the escape grammar.
pub fn unescape_frame(frame: &[u8]) -> Result<Vec<u8>, EscapeError> {
    if frame.len() < 2 {
        return Err(EscapeError::FrameTooShort(frame.len()));
    }

    let interior = &frame[1..frame.len() - 1];
    let mut unescaped = Vec::with_capacity(frame.len());

    unescaped.push(frame[0]);
    let mut i = 0;
    while i < interior.len() {
        if interior[i] == ESC {
            if i + 1 >= interior.len() {
                return Err(EscapeError::IncompleteSequence);
            }

            let next = interior[i + 1];
            if !(0xAD..=0xAF).contains(&next) {
                return Err(EscapeError::InvalidSequence(next));
            }

            unescaped.push(next.wrapping_sub(ESCAPE_OFFSET));
            i += 2;
        } else {
            unescaped.push(interior[i]);
            i += 1;
        }
    }
    unescaped.push(frame[frame.len() - 1]);

    Ok(unescaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_escape() {
        assert!(needs_escape(0x8D));
        assert!(needs_escape(0x8E));
        assert!(needs_escape(0x8F));

        assert!(!needs_escape(0x00));
        assert!(!needs_escape(0x8A));
        assert!(!needs_escape(0x8C));
        assert!(!needs_escape(0x90));
        assert!(!needs_escape(0xFF));
    }

    #[test]
    fn test_escape_passthrough() {
        let frame = vec![0x8E, 0x01, 0x02, 0x03, 0x8F];
        assert_eq!(escape_frame(&frame), frame);
    }

    #[test]
    fn test_escape_interior_control_bytes() {
        let frame = vec![0x8E, 0x8D, 0x8E, 0x8F, 0x8F];
        assert_eq!(
            escape_frame(&frame),
            vec![0x8E, 0x8D, 0xAD, 0x8D, 0xAE, 0x8D, 0xAF, 0x8F]
        );
    }

    #[test]
    fn test_boundaries_never_escaped() {
        // SOR and EOR are control bytes themselves but pass through at the
        // frame boundaries.
        let frame = vec![0x8E, 0x8F];
        assert_eq!(escape_frame(&frame), frame);
    }

    #[test]
    fn test_unescape_single_sequence() {
        let frame = vec![0x8E, 0x01, 0x8D, 0xAF, 0x02, 0x8F];
        assert_eq!(
            unescape_frame(&frame).unwrap(),
            vec![0x8E, 0x01, 0x8F, 0x02, 0x8F]
        );
    }

    #[test]
    fn test_unescape_all_sequences() {
        let frame = vec![0x8E, 0x8D, 0xAD, 0x8D, 0xAE, 0x8D, 0xAF, 0x8F];
        assert_eq!(
            unescape_frame(&frame).unwrap(),
            vec![0x8E, 0x8D, 0x8E, 0x8F, 0x8F]
        );
    }

    #[test]
    fn test_unescape_underflow() {
        // ESC as the final interior byte has nothing to consume
        let frame = vec![0x8E, 0x01, 0x8D, 0x8F];
        assert_eq!(
            unescape_frame(&frame),
            Err(EscapeError::IncompleteSequence)
        );
    }

    #[test]
    fn test_unescape_invalid_sequence() {
        let frame = vec![0x8E, 0x8D, 0x50, 0x8F];
        assert_eq!(
            unescape_frame(&frame),
            Err(EscapeError::InvalidSequence(0x50))
        );
    }

    #[test]
    fn test_too_short() {
        assert_eq!(unescape_frame(&[0x8E]), Err(EscapeError::FrameTooShort(1)));
        assert_eq!(unescape_frame(&[]), Err(EscapeError::FrameTooShort(0)));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Arbitrary conforming wire frames: SOR, an interior where control
    /// bytes only appear as valid escape sequences, EOR.
    fn conforming_frame() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(
            prop_oneof![
                // plain byte outside the control range
                any::<u8>().prop_filter("not a control byte", |b| !needs_escape(*b))
                    .prop_map(|b| vec![b]),
                // valid escape sequence
                (0xADu8..=0xAF).prop_map(|b| vec![ESC, b]),
            ],
            0..64,
        )
        .prop_map(|chunks| {
            let mut frame = vec![SOR];
            frame.extend(chunks.into_iter().flatten());
            frame.push(EOR);
            frame
        })
    }

    proptest! {
        /// Law: escape(unescape(B)) == B for every frame conforming to the
        /// escape grammar.
        #[test]
        fn test_escape_unescape_roundtrip(frame in conforming_frame()) {
            let unescaped = unescape_frame(&frame).expect("conforming frame");
            prop_assert_eq!(escape_frame(&unescaped), frame);
        }

        /// Law: unescape(escape(F)) == F for every unescaped frame.
        #[test]
        fn test_unescape_escape_roundtrip(interior in prop::collection::vec(any::<u8>(), 0..64)) {
            let mut frame = vec![SOR];
            frame.extend(interior);
            frame.push(EOR);

            let escaped = escape_frame(&frame);
            prop_assert_eq!(unescape_frame(&escaped).expect("just escaped"), frame);
        }

        /// Property: no unescaped control byte survives in an escaped interior
        #[test]
        fn test_escaped_interior_has_no_bare_control_bytes(
            interior in prop::collection::vec(any::<u8>(), 0..64)
        ) {
            let mut frame = vec![SOR];
            frame.extend(interior);
            frame.push(EOR);

            let escaped = escape_frame(&frame);
            let inner = &escaped[1..escaped.len() - 1];

            let mut i = 0;
            while i < inner.len() {
                if inner[i] == ESC {
                    i += 2;
                } else {
                    prop_assert!(!needs_escape(inner[i]),
                        "bare control byte 0x{:02X} at interior position {}", inner[i], i);
                    i += 1;
                }
            }
        }
    }
}
