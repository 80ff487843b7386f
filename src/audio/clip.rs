// PCM clip container
// Fixed-format mono 32-bit PCM clips and their 44-byte RIFF layout

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Size of the fixed header that precedes the sample data
pub const HEADER_LEN: usize = 44;

pub const BYTES_PER_SAMPLE: u32 = 4;
pub const BITS_PER_SAMPLE: u16 = 32;
pub const NUM_CHANNELS: u16 = 1;
pub const PCM_FORMAT: u16 = 1;

/// Rate used for recorded slots, the silence filler, and the rendered composition
pub const COMPOSITION_SAMPLE_RATE: u32 = 41000;

/// Rate assumed by standalone writers when none is given
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Largest clip whose data size and RIFF chunk size both fit in 32 bits
pub const MAX_SAMPLES: usize = ((u32::MAX - 36) / BYTES_PER_SAMPLE) as usize;

#[derive(Debug, Error)]
pub enum ClipError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unable to allocate {bytes} bytes for sample data")]
    Allocation { bytes: usize },

    #[error("Sample data ended early: expected {expected} samples, read {read}")]
    Truncated { expected: usize, read: usize },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Clip of {samples} samples exceeds the 4 GiB container limit")]
    TooLarge { samples: usize },
}

pub type ClipResult<T> = Result<T, ClipError>;

/// Header fields of the fixed PCM container, kept verbatim as read from disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub chunk_id: [u8; 4],
    pub chunk_size: u32,
    pub format: [u8; 4],
    pub subchunk1_id: [u8; 4],
    pub subchunk1_size: u32,
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub subchunk2_id: [u8; 4],
    /// Byte length of the sample data (subchunk2Size)
    pub data_size: u32,
}

impl WavHeader {
    /// Build a canonical mono 32-bit PCM header for `sample_count` samples
    pub fn new(sample_rate: u32, sample_count: usize) -> ClipResult<Self> {
        let header = WavHeader {
            chunk_id: *b"RIFF",
            chunk_size: 36,
            format: *b"WAVE",
            subchunk1_id: *b"fmt ",
            subchunk1_size: 16,
            audio_format: PCM_FORMAT,
            num_channels: NUM_CHANNELS,
            sample_rate,
            byte_rate: sample_rate.saturating_mul(NUM_CHANNELS as u32 * BYTES_PER_SAMPLE),
            block_align: (NUM_CHANNELS as u32 * BYTES_PER_SAMPLE) as u16,
            bits_per_sample: BITS_PER_SAMPLE,
            subchunk2_id: *b"data",
            data_size: 0,
        };
        header.with_sample_count(sample_count)
    }

    /// Number of samples declared by the data size field
    pub fn sample_count(&self) -> usize {
        (self.data_size / BYTES_PER_SAMPLE) as usize
    }

    /// Copy of this header resized to hold `sample_count` samples.
    /// Keeps `chunk_size == 36 + data_size`; clips above `MAX_SAMPLES` are
    /// rejected rather than wrapped.
    pub fn with_sample_count(mut self, sample_count: usize) -> ClipResult<Self> {
        let data_size = sample_count
            .checked_mul(BYTES_PER_SAMPLE as usize)
            .and_then(|bytes| u32::try_from(bytes).ok())
            .filter(|_| sample_count <= MAX_SAMPLES)
            .ok_or(ClipError::TooLarge {
                samples: sample_count,
            })?;
        self.data_size = data_size;
        self.chunk_size = data_size + 36;
        Ok(self)
    }

    /// Serialize to the 44-byte little-endian layout
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.chunk_id);
        bytes[4..8].copy_from_slice(&self.chunk_size.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.format);
        bytes[12..16].copy_from_slice(&self.subchunk1_id);
        bytes[16..20].copy_from_slice(&self.subchunk1_size.to_le_bytes());
        bytes[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        bytes[22..24].copy_from_slice(&self.num_channels.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        bytes[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        bytes[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        bytes[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        bytes[36..40].copy_from_slice(&self.subchunk2_id);
        bytes[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        bytes
    }

    /// Parse the 44-byte layout. Only the chunk tags and the word alignment
    /// of the data size are checked; every other field is taken as-is.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> ClipResult<Self> {
        let header = WavHeader {
            chunk_id: tag_at(bytes, 0),
            chunk_size: u32_at(bytes, 4),
            format: tag_at(bytes, 8),
            subchunk1_id: tag_at(bytes, 12),
            subchunk1_size: u32_at(bytes, 16),
            audio_format: u16_at(bytes, 20),
            num_channels: u16_at(bytes, 22),
            sample_rate: u32_at(bytes, 24),
            byte_rate: u32_at(bytes, 28),
            block_align: u16_at(bytes, 32),
            bits_per_sample: u16_at(bytes, 34),
            subchunk2_id: tag_at(bytes, 36),
            data_size: u32_at(bytes, 40),
        };

        for (found, expected) in [
            (&header.chunk_id, b"RIFF"),
            (&header.format, b"WAVE"),
            (&header.subchunk1_id, b"fmt "),
            (&header.subchunk2_id, b"data"),
        ] {
            if found != expected {
                return Err(ClipError::InvalidHeader(format!(
                    "expected tag {:?}, found {:?}",
                    String::from_utf8_lossy(expected),
                    String::from_utf8_lossy(found)
                )));
            }
        }

        if header.data_size % BYTES_PER_SAMPLE != 0 {
            return Err(ClipError::InvalidHeader(format!(
                "data size {} is not a multiple of {}",
                header.data_size, BYTES_PER_SAMPLE
            )));
        }

        Ok(header)
    }
}

fn tag_at(bytes: &[u8; HEADER_LEN], offset: usize) -> [u8; 4] {
    [bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]
}

fn u32_at(bytes: &[u8; HEADER_LEN], offset: usize) -> u32 {
    u32::from_le_bytes(tag_at(bytes, offset))
}

fn u16_at(bytes: &[u8; HEADER_LEN], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// Allocate an empty sample buffer able to hold `capacity` samples,
/// reporting allocation failure instead of aborting.
pub(crate) fn try_sample_buffer(capacity: usize) -> ClipResult<Vec<i32>> {
    let bytes = capacity
        .checked_mul(BYTES_PER_SAMPLE as usize)
        .ok_or(ClipError::Allocation { bytes: usize::MAX })?;
    if capacity > MAX_SAMPLES {
        return Err(ClipError::TooLarge { samples: capacity });
    }

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(capacity)
        .map_err(|_| ClipError::Allocation { bytes })?;
    Ok(buffer)
}

/// One mono 32-bit PCM clip: header metadata plus an exclusively owned sample buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmClip {
    header: WavHeader,
    samples: Vec<i32>,
}

impl PcmClip {
    /// Create a clip at `sample_rate` with a canonical header
    pub fn new(sample_rate: u32, samples: Vec<i32>) -> ClipResult<Self> {
        let header = WavHeader::new(sample_rate, samples.len())?;
        Ok(PcmClip { header, samples })
    }

    /// Standalone writer constructor: a zero sample rate falls back to 44100 Hz
    pub fn from_samples(samples: Vec<i32>, sample_rate: u32) -> ClipResult<Self> {
        let rate = if sample_rate == 0 {
            DEFAULT_SAMPLE_RATE
        } else {
            sample_rate
        };
        Self::new(rate, samples)
    }

    /// Reuse `header` for a freshly produced buffer, resizing its size fields
    pub(crate) fn with_header(header: WavHeader, samples: Vec<i32>) -> ClipResult<Self> {
        let header = header.with_sample_count(samples.len())?;
        Ok(PcmClip { header, samples })
    }

    pub fn header(&self) -> &WavHeader {
        &self.header
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i32> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.header.sample_rate
    }

    /// Duration in seconds at the header's sample rate
    pub fn duration_secs(&self) -> f64 {
        if self.header.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.header.sample_rate as f64
    }

    /// Read a clip from any byte source.
    ///
    /// The header's declared size is trusted for the allocation, but only
    /// `declared - 1` samples are read; the final sample is left at zero.
    /// `save` writes all declared samples, so a save/load round trip zeroes
    /// the last sample.
    pub fn read_from<R: Read>(reader: &mut R) -> ClipResult<Self> {
        let mut raw = [0u8; HEADER_LEN];
        reader.read_exact(&mut raw).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                ClipError::InvalidHeader(format!("shorter than {} bytes", HEADER_LEN))
            } else {
                ClipError::Io(e)
            }
        })?;
        let header = WavHeader::parse(&raw)?;

        let declared = header.sample_count();
        let mut samples = try_sample_buffer(declared)?;
        samples.resize(declared, 0);

        let expected = declared.saturating_sub(1);
        let mut word = [0u8; 4];
        for (read, sample) in samples.iter_mut().take(expected).enumerate() {
            match reader.read_exact(&mut word) {
                Ok(()) => *sample = i32::from_le_bytes(word),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    log::error!("Clip data ended after {} of {} samples", read, expected);
                    return Err(ClipError::Truncated { expected, read });
                }
                Err(e) => return Err(ClipError::Io(e)),
            }
        }

        Ok(PcmClip { header, samples })
    }

    /// Write the header verbatim followed by every declared sample
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.header.to_bytes())?;
        for sample in self.samples.iter().take(self.header.sample_count()) {
            writer.write_all(&sample.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn from_bytes(data: &[u8]) -> ClipResult<Self> {
        let mut reader = data;
        Self::read_from(&mut reader)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.samples.len() * 4);
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut out);
        out
    }

    /// Load a clip from disk (see `read_from` for the read count)
    pub fn load(path: impl AsRef<Path>) -> ClipResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            log::error!("Can not open {}: {}", path.display(), e);
            e
        })?;
        let clip = Self::read_from(&mut BufReader::new(file))?;
        log::debug!(
            "Loaded {}: {} samples @ {} Hz",
            path.display(),
            clip.len(),
            clip.sample_rate()
        );
        Ok(clip)
    }

    /// Save a clip to disk, replacing any existing file
    pub fn save(&self, path: impl AsRef<Path>) -> ClipResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            log::error!("Can not create {}: {}", path.display(), e);
            e
        })?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        log::debug!("Wrote {} ({} samples)", path.display(), self.len());
        Ok(())
    }
}

/// Synthesize a zero-filled clip of `floor(sample_rate * duration_secs)` samples
pub fn make_silence(duration_secs: f64, sample_rate: u32) -> ClipResult<PcmClip> {
    let sample_count = (sample_rate as f64 * duration_secs).floor() as usize;
    let mut samples = try_sample_buffer(sample_count)?;
    samples.resize(sample_count, 0);
    PcmClip::new(sample_rate, samples)
}
