// Audio module
// PCM clip container, raw capture decoding, and capture sessions

pub mod capture;
pub mod clip;
pub mod decoder;

pub use capture::{CaptureDriver, CaptureError, CaptureSession, Register};
pub use clip::{
    make_silence, ClipError, ClipResult, PcmClip, WavHeader, COMPOSITION_SAMPLE_RATE,
    DEFAULT_SAMPLE_RATE, MAX_SAMPLES,
};
pub use decoder::{decode_samples, decode_session, ChannelParity, DecodeStats, FrameWord, RawFrame};
