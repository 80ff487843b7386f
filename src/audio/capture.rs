// Capture sessions against the audio line-in hardware
// The driver is injected; this module never touches registers directly

use thiserror::Error;

use super::clip::{ClipError, PcmClip};
use super::decoder::{decode_session, RawFrame};
use crate::config::SequencerConfig;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture device unavailable: {0}")]
    Unavailable(String),
    #[error("Frame transfer failed: {0}")]
    Transfer(String),
    #[error("Register access failed: {0}")]
    Register(String),
    #[error("Capture buffer error: {0}")]
    Clip(#[from] ClipError),
}

/// Driver registers the session touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Control,
    Status,
    Key,
    Gain,
}

/// An initialized capture device.
///
/// Opening the device is the implementor's business; a value of this type is
/// the open handle. `release` must leave the device reusable.
pub trait CaptureDriver {
    /// Block until one full transfer is available
    fn receive_frame(&mut self) -> Result<RawFrame, CaptureError>;

    fn read_register(&mut self, register: Register) -> Result<u32, CaptureError>;

    fn write_register(&mut self, register: Register, value: u32) -> Result<(), CaptureError>;

    fn release(&mut self);
}

/// Parameters of one fixed-length recording
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSession {
    sample_rate: u32,
    capacity: usize,
    transfer_runs: usize,
    gain: u32,
}

impl CaptureSession {
    pub fn new(sample_rate: u32, capacity: usize, transfer_runs: usize, gain: u32) -> Self {
        Self {
            sample_rate,
            capacity,
            transfer_runs,
            gain,
        }
    }

    pub fn from_config(config: &SequencerConfig) -> Self {
        Self::new(
            config.sample_rate,
            config.samples_per_clip(),
            config.transfer_runs(),
            config.capture_gain,
        )
    }

    /// Samples in the decoded clip
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn transfer_runs(&self) -> usize {
        self.transfer_runs
    }

    /// Configure the device, pull every transfer, release, and decode.
    /// The driver is released even when configuration or a transfer fails.
    pub fn record<D: CaptureDriver + ?Sized>(&self, driver: &mut D) -> Result<PcmClip, CaptureError> {
        let frames = self
            .configure(driver)
            .and_then(|()| self.collect_frames(driver));
        driver.release();
        let frames = frames?;

        log::info!(
            "Captured {} transfers, decoding into {} samples",
            frames.len(),
            self.capacity
        );
        Ok(decode_session(&frames, self.capacity, self.sample_rate)?)
    }

    fn configure<D: CaptureDriver + ?Sized>(&self, driver: &mut D) -> Result<(), CaptureError> {
        let before = driver.read_register(Register::Control)?;
        driver.write_register(Register::Control, 0x1)?;
        log::debug!(
            "Control register: {:08x} -> {:08x}",
            before,
            driver.read_register(Register::Control)?
        );
        log::debug!("Status register: {:08x}", driver.read_register(Register::Status)?);
        log::debug!("Key register: {:08x}", driver.read_register(Register::Key)?);

        driver.write_register(Register::Gain, self.gain)?;
        log::debug!("Gain register: {:08x}", driver.read_register(Register::Gain)?);
        Ok(())
    }

    fn collect_frames<D: CaptureDriver + ?Sized>(&self, driver: &mut D) -> Result<Vec<RawFrame>, CaptureError> {
        let mut frames = Vec::with_capacity(self.transfer_runs);
        for run in 0..self.transfer_runs {
            let frame = driver.receive_frame().map_err(|e| {
                log::error!("Transfer {} of {} failed: {}", run + 1, self.transfer_runs, e);
                e
            })?;
            frames.push(frame);
        }
        Ok(frames)
    }
}
