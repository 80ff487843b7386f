// Clip mixing
// Averaging overlap, concatenation, and integer gain over whole clips

use serde::{Deserialize, Serialize};

use crate::audio::clip::{try_sample_buffer, ClipResult, PcmClip};

/// Overflow behaviour of the gain stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmplifyMode {
    /// Two's-complement wraparound
    #[default]
    Wrapping,
    /// Clamp to the i32 range
    Saturating,
}

/// Mix two clips sample by sample as `(a + b) / 2`, truncating toward zero.
///
/// The result is as long as the shorter input and takes `a`'s header.
pub fn overlap(a: &PcmClip, b: &PcmClip) -> ClipResult<PcmClip> {
    let len = a.len().min(b.len());
    let mut samples = try_sample_buffer(len)?;
    samples.extend(
        a.samples()
            .iter()
            .zip(b.samples())
            .map(|(&x, &y)| average(x, y)),
    );
    PcmClip::with_header(*a.header(), samples)
}

// Sum in i64 so the intermediate cannot overflow; the mean always fits i32.
fn average(a: i32, b: i32) -> i32 {
    ((a as i64 + b as i64) / 2) as i32
}

/// Concatenate `b` after `a`, taking `a`'s header
pub fn append(a: &PcmClip, b: &PcmClip) -> ClipResult<PcmClip> {
    let mut samples = try_sample_buffer(a.len() + b.len())?;
    samples.extend_from_slice(a.samples());
    samples.extend_from_slice(b.samples());
    PcmClip::with_header(*a.header(), samples)
}

/// Multiply every sample by `factor`
pub fn amplify(clip: &PcmClip, factor: i32, mode: AmplifyMode) -> ClipResult<PcmClip> {
    let mut samples = try_sample_buffer(clip.len())?;
    samples.extend(clip.samples().iter().map(|&s| match mode {
        AmplifyMode::Wrapping => s.wrapping_mul(factor),
        AmplifyMode::Saturating => s.saturating_mul(factor),
    }));
    PcmClip::with_header(*clip.header(), samples)
}
