//! Record splitting for raw decoder reads.
//!
//! The decoder concatenates frames on the TCP stream; a record boundary is
//! an EOR byte (0x8F) immediately followed by an SOR byte (0x8E). Escape
//! stuffing guarantees neither byte appears literally inside a frame
//! interior, so the adjacency test is unambiguous on wire bytes.

use amb_protocol::{EOR, SOR};

/// Split a buffer into candidate frames at every EOR,SOR adjacency.
///
/// The trailing frame is emitted as-is, whether or not it is complete; use
/// [`FrameSplitter`] when reads must be joined across the boundary.
pub fn split_records(data: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut current = Vec::new();

    for (index, &byte) in data.iter().enumerate() {
        current.push(byte);
        if byte == EOR && data.get(index + 1) == Some(&SOR) {
            frames.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        frames.push(current);
    }

    frames
}

/// Stateful splitter that buffers an incomplete trailing frame across reads.
///
/// Complete frames end with EOR; anything after the last EOR,SOR boundary
/// that does not is held back and joined with the next read.
pub struct FrameSplitter {
    buffer: Vec<u8>,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Feed raw bytes from the stream; returns every complete frame now
    /// available, in arrival order.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(data);

        let mut frames = split_records(&self.buffer);
        self.buffer.clear();

        if frames.last().is_some_and(|frame| frame.last() != Some(&EOR))
            && let Some(partial) = frames.pop()
        {
            self.buffer = partial;
        }

        frames
    }

    /// Bytes currently held back waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_record_untouched() {
        let frame = vec![0x8E, 0x01, 0x02, 0x8F];
        assert_eq!(split_records(&frame), vec![frame]);
    }

    #[test]
    fn test_two_concatenated_records() {
        let a = vec![0x8E, 0x01, 0x8F];
        let b = vec![0x8E, 0x02, 0x03, 0x8F];
        let joined: Vec<u8> = a.iter().chain(b.iter()).copied().collect();

        assert_eq!(split_records(&joined), vec![a, b]);
    }

    #[test]
    fn test_eor_without_following_sor_is_not_a_boundary() {
        // 0x8F followed by a data byte stays in the same frame
        let data = vec![0x8E, 0x8F, 0x01];
        assert_eq!(split_records(&data), vec![data]);
    }

    #[test]
    fn test_trailing_partial_emitted_as_is() {
        let mut data = vec![0x8E, 0x01, 0x8F];
        data.extend([0x8E, 0x02]); // incomplete second frame
        let frames = split_records(&data);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], vec![0x8E, 0x01, 0x8F]);
        assert_eq!(frames[1], vec![0x8E, 0x02]);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_records(&[]).is_empty());
    }

    #[test]
    fn test_splitter_buffers_partial_frame() {
        let mut splitter = FrameSplitter::new();

        // First read ends mid-frame
        let frames = splitter.feed(&[0x8E, 0x01, 0x8F, 0x8E, 0x02]);
        assert_eq!(frames, vec![vec![0x8E, 0x01, 0x8F]]);
        assert_eq!(splitter.pending(), 2);

        // Second read completes it
        let frames = splitter.feed(&[0x03, 0x8F]);
        assert_eq!(frames, vec![vec![0x8E, 0x02, 0x03, 0x8F]]);
        assert_eq!(splitter.pending(), 0);
    }

    #[test]
    fn test_splitter_emits_complete_trailing_frame() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.feed(&[0x8E, 0x01, 0x8F, 0x8E, 0x02, 0x8F]);

        assert_eq!(frames.len(), 2);
        assert_eq!(splitter.pending(), 0);
    }

    #[test]
    fn test_splitter_frame_split_across_three_reads() {
        let mut splitter = FrameSplitter::new();

        assert!(splitter.feed(&[0x8E, 0x01]).is_empty());
        assert!(splitter.feed(&[0x02, 0x03]).is_empty());
        let frames = splitter.feed(&[0x8F]);
        assert_eq!(frames, vec![vec![0x8E, 0x01, 0x02, 0x03, 0x8F]]);
    }
}
