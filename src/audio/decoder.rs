//! Raw capture frame decoding
//!
//! The capture hardware delivers fixed-size transfers of 32-bit words with the
//! two line channels interleaved (even/odd word index) and every word
//! serialized bit-reversed. Decoding picks the live channel, restores bit
//! order, patches read glitches, and fills a buffer of fixed capacity.

use super::clip::{ClipResult, PcmClip, WavHeader};

/// Bits holding the sequence counter (high end of the word)
pub const SEQUENCE_BITS: u32 = 14;

/// Bits holding the sample magnitude (low end of the word)
pub const MAGNITUDE_BITS: u32 = 18;

const MAGNITUDE_MASK: u32 = (1 << MAGNITUDE_BITS) - 1;

/// One 32-bit capture word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWord(pub u32);

impl FrameWord {
    /// 14-bit sequence counter
    pub fn sequence(&self) -> u16 {
        ((self.0 >> MAGNITUDE_BITS) & ((1 << SEQUENCE_BITS) - 1)) as u16
    }

    /// 18-bit sample magnitude
    pub fn magnitude(&self) -> u32 {
        self.0 & MAGNITUDE_MASK
    }

    /// Magnitude scaled to [0, 100] of full scale
    pub fn percent_of_full_scale(&self) -> u32 {
        self.magnitude() * 100 / MAGNITUDE_MASK
    }

    /// Diagnostic dump: each byte in memory order printed LSB first,
    /// then counter, hex magnitude and percentage
    pub fn describe(&self) -> String {
        let bits: Vec<String> = self
            .0
            .to_le_bytes()
            .iter()
            .map(|byte| (0..8).map(|i| if byte & (1 << i) != 0 { '1' } else { '0' }).collect())
            .collect();

        format!(
            "{}  -> [{}]: {:02x} ({}p)",
            bits.join(" "),
            self.sequence(),
            self.magnitude(),
            self.percent_of_full_scale()
        )
    }
}

/// One hardware transfer: a fixed-size batch of capture words
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFrame {
    words: Vec<u32>,
}

impl RawFrame {
    pub fn new(words: Vec<u32>) -> Self {
        RawFrame { words }
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn word(&self, index: usize) -> Option<FrameWord> {
        self.words.get(index).copied().map(FrameWord)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// One diagnostic line per word
    pub fn describe(&self) -> Vec<String> {
        self.words.iter().map(|&w| FrameWord(w).describe()).collect()
    }
}

impl From<Vec<u32>> for RawFrame {
    fn from(words: Vec<u32>) -> Self {
        RawFrame::new(words)
    }
}

/// Which word positions within a frame carry the live channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelParity {
    Even,
    Odd,
}

impl ChannelParity {
    /// Decided once per session: a zero first word means the live channel
    /// sits on the odd positions.
    pub fn detect(frames: &[RawFrame]) -> Self {
        match frames.first().and_then(|frame| frame.words().first()) {
            Some(0) => ChannelParity::Odd,
            _ => ChannelParity::Even,
        }
    }

    pub fn is_active(&self, index: usize) -> bool {
        match self {
            ChannelParity::Even => index % 2 == 0,
            ChannelParity::Odd => index % 2 == 1,
        }
    }
}

/// Restore hardware bit order: output bit `i` is input bit `31 - i`
pub fn decode_word(word: u32) -> i32 {
    word.reverse_bits() as i32
}

/// Counters collected while decoding a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStats {
    pub parity: ChannelParity,
    /// Samples written to the buffer
    pub accepted: usize,
    /// Zero samples replaced by their predecessor
    pub repaired: usize,
    /// Live-channel words that did not fit the buffer
    pub discarded: usize,
}

/// Decode `frames` into a buffer of exactly `capacity` samples.
///
/// A decoded zero anywhere but the first position is treated as a read glitch
/// and replaced by the previous sample. Words beyond `capacity` are dropped;
/// a short session leaves the tail at zero.
pub fn decode_samples(frames: &[RawFrame], capacity: usize) -> (Vec<i32>, DecodeStats) {
    let parity = ChannelParity::detect(frames);
    let mut buffer = vec![0i32; capacity];
    let mut stats = DecodeStats {
        parity,
        accepted: 0,
        repaired: 0,
        discarded: 0,
    };

    let live_words = frames.iter().flat_map(|frame| {
        frame
            .words()
            .iter()
            .enumerate()
            .filter(move |(index, _)| parity.is_active(*index))
            .map(|(_, word)| *word)
    });

    let mut position = 0;
    for word in live_words {
        if position >= capacity {
            stats.discarded += 1;
            continue;
        }

        let mut sample = decode_word(word);
        if sample == 0 && position > 0 {
            sample = buffer[position - 1];
            stats.repaired += 1;
        }

        buffer[position] = sample;
        position += 1;
        stats.accepted += 1;
    }

    (buffer, stats)
}

/// Decode a whole capture session into one clip at `sample_rate`.
/// Fails only when `capacity` is beyond the container limit, before any
/// buffer is allocated.
pub fn decode_session(
    frames: &[RawFrame],
    capacity: usize,
    sample_rate: u32,
) -> ClipResult<PcmClip> {
    let header = WavHeader::new(sample_rate, capacity)?;

    if log::log_enabled!(log::Level::Trace) {
        if let Some(first) = frames.first() {
            for line in first.describe() {
                log::trace!("{}", line);
            }
        }
    }

    let (samples, stats) = decode_samples(frames, capacity);

    log::debug!(
        "Decoded {} frames ({:?} channel): {} accepted, {} repaired, {} discarded",
        frames.len(),
        stats.parity,
        stats.accepted,
        stats.repaired,
        stats.discarded
    );
    if stats.accepted < capacity {
        log::warn!(
            "Capture session short by {} samples; tail left silent",
            capacity - stats.accepted
        );
    }

    PcmClip::with_header(header, samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clip::{ClipError, MAX_SAMPLES};

    // Word whose decoded (bit-reversed) value is `sample`
    fn encoded(sample: i32) -> u32 {
        (sample as u32).reverse_bits()
    }

    #[test]
    fn test_bit_reversal_is_involution() {
        for word in [0u32, 1, 0x8000_0000, 0xDEAD_BEEF, 0x0F0F_0F0F, u32::MAX, 12345] {
            assert_eq!(word.reverse_bits().reverse_bits(), word);
        }
    }

    #[test]
    fn test_decode_word_reverses_every_bit() {
        assert_eq!(decode_word(0x0000_0001), i32::MIN);
        assert_eq!(decode_word(0x8000_0000), 1);
        assert_eq!(decode_word(0x0000_000F), 0xF000_0000u32 as i32);
        for i in 0..32 {
            assert_eq!(decode_word(1 << i) as u32, 1 << (31 - i));
        }
    }

    #[test]
    fn test_frame_word_fields() {
        let word = FrameWord((0x1234 << 18) | 0x3_FFFF);
        assert_eq!(word.sequence(), 0x1234 & 0x3FFF);
        assert_eq!(word.magnitude(), 0x3_FFFF);
        assert_eq!(word.percent_of_full_scale(), 100);

        let half = FrameWord(MAGNITUDE_MASK / 2);
        assert_eq!(half.percent_of_full_scale(), 49);
    }

    #[test]
    fn test_frame_word_describe() {
        let line = FrameWord(1 << 18 | 0x10).describe();
        assert!(line.starts_with("00001000 00000000 00100000 00000000"));
        assert!(line.ends_with("-> [1]: 10 (0p)"));
    }

    #[test]
    fn test_parity_detection() {
        let odd = vec![RawFrame::new(vec![0, 5, 0, 6])];
        assert_eq!(ChannelParity::detect(&odd), ChannelParity::Odd);

        let even = vec![RawFrame::new(vec![7, 0, 8, 0])];
        assert_eq!(ChannelParity::detect(&even), ChannelParity::Even);

        assert_eq!(ChannelParity::detect(&[]), ChannelParity::Even);
    }

    #[test]
    fn test_decode_selects_odd_channel() {
        let frames = vec![
            RawFrame::new(vec![0, encoded(10), 0, encoded(20)]),
            RawFrame::new(vec![0, encoded(30), 0, encoded(40)]),
        ];
        let (samples, stats) = decode_samples(&frames, 4);
        assert_eq!(samples, vec![10, 20, 30, 40]);
        assert_eq!(stats.parity, ChannelParity::Odd);
        assert_eq!(frames[0].word(1), Some(FrameWord(encoded(10))));
        assert_eq!(stats.accepted, 4);
        assert_eq!(stats.repaired, 0);
    }

    #[test]
    fn test_decode_selects_even_channel() {
        let frames = vec![RawFrame::new(vec![
            encoded(1),
            encoded(99),
            encoded(2),
            encoded(99),
        ])];
        let (samples, stats) = decode_samples(&frames, 2);
        assert_eq!(samples, vec![1, 2]);
        assert_eq!(stats.parity, ChannelParity::Even);
    }

    #[test]
    fn test_glitch_repair_uses_previous_sample() {
        let frames = vec![RawFrame::new(vec![
            encoded(5),
            0,
            0,
            0,
            encoded(-8),
            0,
            0,
            0,
        ])];
        let (samples, stats) = decode_samples(&frames, 4);
        assert_eq!(samples, vec![5, 5, -8, -8]);
        assert_eq!(stats.repaired, 2);
    }

    #[test]
    fn test_first_sample_never_repaired() {
        // Odd channel, first live word decodes to zero
        let frames = vec![RawFrame::new(vec![0, 0, 0, encoded(3)])];
        let (samples, stats) = decode_samples(&frames, 2);
        assert_eq!(samples, vec![0, 3]);
        assert_eq!(stats.repaired, 0);
    }

    #[test]
    fn test_overflow_is_discarded() {
        let frames = vec![RawFrame::new(
            (1..=10).flat_map(|s| [encoded(s), 0]).collect(),
        )];
        let (samples, stats) = decode_samples(&frames, 3);
        assert_eq!(samples, vec![1, 2, 3]);
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.discarded, 7);
    }

    #[test]
    fn test_short_session_leaves_tail_silent() {
        let frames = vec![RawFrame::new(vec![encoded(4), 0])];
        let (samples, _) = decode_samples(&frames, 3);
        assert_eq!(samples, vec![4, 0, 0]);
    }

    #[test]
    fn test_decode_session_builds_clip() {
        let frames = vec![RawFrame::new(vec![encoded(11), 0, encoded(12), 0])];
        let clip = decode_session(&frames, 2, 41000).unwrap();
        assert_eq!(clip.samples(), &[11, 12]);
        assert_eq!(clip.sample_rate(), 41000);
        assert_eq!(clip.header().data_size, 8);
    }

    #[test]
    fn test_decode_session_rejects_oversized_capacity() {
        let frames = vec![RawFrame::new(vec![encoded(1), 0])];
        let result = decode_session(&frames, MAX_SAMPLES + 1, 41000);
        assert!(matches!(result, Err(ClipError::TooLarge { .. })));
    }
}
