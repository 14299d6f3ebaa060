//! Windowing and FFT stage
//!
//! Converts one [`SampleBlock`] of exactly the configured FFT size
//! into a [`PowerSpectrum`]: apply the analysis window, take the FFT,
//! convert to dB, and reorder the bins so the spectrum reads low to
//! high frequency (the conventional zero-frequency shift). Power is
//! normalized by the window power so detection thresholds do not
//! depend on the window choice.

use std::fmt;
use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use strum_macros::{Display, EnumString};

use crate::block::SampleBlock;
use crate::error::Error;

// substituted for zero/negative power before the dB conversion
const MIN_POWER: f32 = 1.0e-12;

/// Analysis window shape
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum WindowKind {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
    BlackmanHarris,
}

impl WindowKind {
    /// Window coefficients for an analysis frame of `len` samples
    pub fn coefficients(self, len: usize) -> Vec<f32> {
        if len < 2 {
            return vec![1.0; len];
        }
        let step = 2.0 * std::f32::consts::PI / (len as f32 - 1.0);
        (0..len)
            .map(|i| {
                let x = step * i as f32;
                match self {
                    WindowKind::Rectangular => 1.0,
                    WindowKind::Hann => 0.5 - 0.5 * x.cos(),
                    WindowKind::Hamming => 0.54 - 0.46 * x.cos(),
                    WindowKind::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                    WindowKind::BlackmanHarris => {
                        0.35875 - 0.48829 * x.cos() + 0.14128 * (2.0 * x).cos()
                            - 0.01168 * (3.0 * x).cos()
                    }
                }
            })
            .collect()
    }
}

/// A power spectrum in dB, ordered low to high frequency
///
/// The length always equals the FFT size that produced it. Bin
/// frequencies increase monotonically and are centered on the
/// capture's center frequency.
#[derive(Clone, Debug, PartialEq)]
pub struct PowerSpectrum {
    power_db: Vec<f32>,
    center_freq: u64,
    bin_hz: f64,
}

impl PowerSpectrum {
    /// Assemble a spectrum from raw bins
    ///
    /// `power_db[0]` must be the lowest-frequency bin.
    pub fn new(power_db: Vec<f32>, center_freq: u64, bin_hz: f64) -> Self {
        Self {
            power_db,
            center_freq,
            bin_hz,
        }
    }

    /// Number of bins (the FFT size)
    pub fn len(&self) -> usize {
        self.power_db.len()
    }

    /// True if the spectrum holds no bins
    pub fn is_empty(&self) -> bool {
        self.power_db.is_empty()
    }

    /// Bin powers in dB, lowest frequency first
    #[inline]
    pub fn power_db(&self) -> &[f32] {
        &self.power_db
    }

    /// Width of one bin, in Hz
    pub fn bin_hz(&self) -> f64 {
        self.bin_hz
    }

    /// Center frequency of the capture, in Hz
    pub fn center_freq(&self) -> u64 {
        self.center_freq
    }

    /// Absolute frequency of bin `bin`, in Hz
    #[inline]
    pub fn frequency(&self, bin: usize) -> f64 {
        let half = (self.power_db.len() / 2) as f64;
        self.center_freq as f64 + (bin as f64 - half) * self.bin_hz
    }

    /// Iterate `(frequency, power_db)` pairs, lowest frequency first
    pub fn pairs(&self) -> impl Iterator<Item = (f64, f32)> + '_ {
        self.power_db
            .iter()
            .enumerate()
            .map(|(bin, &db)| (self.frequency(bin), db))
    }

    /// Strongest bin as `(bin, power_db)`
    pub fn peak(&self) -> Option<(usize, f32)> {
        self.power_db
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Windowing and FFT stage
///
/// The analyzer is immutable after construction: processing the same
/// block twice yields bit-identical spectra. Changing the FFT size
/// means building a new analyzer (and, downstream, restarting any
/// [`SpectralAverage`](crate::SpectralAverage)).
#[derive(Clone)]
pub struct SpectrumAnalyzer {
    fft_size: usize,
    window_kind: WindowKind,
    window: Vec<f32>,
    window_power_db: f32,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer for the given FFT size and window
    pub fn new(fft_size: usize, window_kind: WindowKind) -> Self {
        let window = window_kind.coefficients(fft_size);
        let window_power: f32 = window.iter().map(|w| w * w).sum();
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        Self {
            fft_size,
            window_kind,
            window,
            window_power_db: 10.0 * window_power.max(MIN_POWER).log10(),
            fft,
        }
    }

    /// Configured FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Configured window shape
    pub fn window_kind(&self) -> WindowKind {
        self.window_kind
    }

    /// Compute the power spectrum of one sample block
    ///
    /// The block must contain exactly [`fft_size`](Self::fft_size)
    /// samples; anything else is a caller bug and fails with
    /// [`Error::ShapeMismatch`]. The input is never truncated or
    /// zero-padded.
    pub fn process(&self, block: &SampleBlock) -> Result<PowerSpectrum, Error> {
        if block.len() != self.fft_size {
            return Err(Error::ShapeMismatch {
                expected: self.fft_size,
                actual: block.len(),
            });
        }

        let mut buf: Vec<Complex<f32>> = block
            .samples()
            .iter()
            .zip(self.window.iter())
            .map(|(&sample, &w)| sample * w)
            .collect();
        self.fft.process(&mut buf);

        // reorder so bin 0 is the lowest frequency in the band
        let n = self.fft_size;
        let power_db = (0..n)
            .map(|bin| {
                let power = buf[(bin + n / 2) % n].norm_sqr();
                10.0 * power.max(MIN_POWER).log10() - self.window_power_db
            })
            .collect();

        Ok(PowerSpectrum::new(
            power_db,
            block.center_freq(),
            block.sample_rate() as f64 / n as f64,
        ))
    }
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("fft_size", &self.fft_size)
            .field("window_kind", &self.window_kind)
            .finish()
    }
}
