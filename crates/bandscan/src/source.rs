//! Tuner hardware contract
//!
//! The [`SampleSource`] trait is the boundary between this crate and
//! whatever owns the physical tuner. Implementations live with the
//! hardware layer; this crate only requires retune, gain, and blocking
//! block reads. Failures surface as [`HardwareError`] and are always
//! propagated to the session owner, never swallowed inside the DSP
//! stages.

use std::fmt;

use thiserror::Error;

use crate::block::SampleBlock;

/// Tuner gain setting
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gain {
    /// Hardware automatic gain
    Auto,
    /// Fixed gain, in dB
    Db(f32),
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gain::Auto => write!(f, "auto"),
            Gain::Db(db) => write!(f, "{:.1} dB", db),
        }
    }
}

/// Read-only tuner state snapshot
///
/// Snapshots must always be producible without blocking on an
/// in-flight capture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TunerStatus {
    pub connected: bool,
    /// Center frequency, Hz
    pub frequency: u64,
    /// Sample rate, Hz
    pub sample_rate: u32,
    pub gain: Gain,
}

/// Device-level failure
///
/// Hardware errors terminate the active pipeline session; the session
/// owner decides whether to retry, skip a scan step, or abort.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum HardwareError {
    #[error("device is busy or claimed by another process")]
    Busy,
    #[error("usb transfer failed: {0}")]
    Transfer(String),
    #[error("retune to {freq_hz} Hz did not settle")]
    RetuneTimeout { freq_hz: u64 },
    #[error("device disconnected")]
    Disconnected,
}

/// A source of IQ sample blocks
///
/// One `SampleSource` feeds at most one active pipeline (analysis or
/// demodulation) at a time; the tuner exposes a single stream.
pub trait SampleSource {
    /// Retune to the given center frequency, in Hz
    fn set_frequency(&mut self, hz: u64) -> Result<(), HardwareError>;

    /// Set tuner gain
    fn set_gain(&mut self, gain: Gain) -> Result<(), HardwareError>;

    /// Blocking read of `count` complex samples
    ///
    /// The returned block is tagged with the rate and frequency in
    /// effect for the capture.
    fn read_samples(&mut self, count: usize) -> Result<SampleBlock, HardwareError>;

    /// Non-blocking status snapshot
    fn status(&self) -> TunerStatus;

    /// Release the device handle
    ///
    /// Must be called before handing the device to an external
    /// decoder process, and on session teardown.
    fn close(&mut self);
}

/// A frequency range a known tuner cannot lock to
#[derive(Clone, Copy, Debug)]
pub struct TunerGap {
    pub label: &'static str,
    pub low_hz: u64,
    pub high_hz: u64,
}

// The E4000 cannot lock in its L-band gap. Operations there proceed,
// downgraded to a warning; R820T-class tuners cover the range.
const TUNER_GAPS: &[TunerGap] = &[TunerGap {
    label: "E4000 L-band gap",
    low_hz: 1_084_000_000,
    high_hz: 1_239_000_000,
}];

/// Look up a known tuner gap covering `freq_hz`
///
/// Returns the gap record if some supported tuner is unable to lock
/// at this frequency. Callers should log a settling warning and
/// proceed.
pub fn tuner_gap(freq_hz: u64) -> Option<&'static TunerGap> {
    TUNER_GAPS
        .iter()
        .find(|gap| (gap.low_hz..=gap.high_hz).contains(&freq_hz))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuner_gap() {
        // ADS-B sits squarely in the E4000 gap
        assert!(tuner_gap(1_090_000_000).is_some());
        assert!(tuner_gap(978_000_000).is_none());
        assert!(tuner_gap(100_000_000).is_none());
    }

    #[test]
    fn test_gain_display() {
        assert_eq!("auto", Gain::Auto.to_string());
        assert_eq!("28.0 dB", Gain::Db(28.0).to_string());
    }
}
