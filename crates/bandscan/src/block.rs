//! IQ sample blocks

use num_complex::Complex;

/// A block of complex IQ samples
///
/// A `SampleBlock` is an ordered run of complex baseband samples
/// tagged with the sample rate and center frequency that were in
/// effect when it was captured. Blocks are immutable once captured
/// and are moved between pipeline stages by value.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBlock {
    samples: Vec<Complex<f32>>,
    sample_rate: u32,
    center_freq: u64,
}

impl SampleBlock {
    /// Create a block from complex samples
    ///
    /// `sample_rate` is in samples per second and `center_freq`
    /// is the tuner center frequency, in Hz.
    pub fn new(samples: Vec<Complex<f32>>, sample_rate: u32, center_freq: u64) -> Self {
        Self {
            samples,
            sample_rate,
            center_freq,
        }
    }

    /// Create a block from interleaved I/Q floats
    ///
    /// `iq` must contain samples as `[i0, q0, i1, q1, …]`. A
    /// trailing unpaired value, if any, is ignored.
    pub fn from_interleaved(iq: &[f32], sample_rate: u32, center_freq: u64) -> Self {
        let samples = iq
            .chunks_exact(2)
            .map(|pair| Complex::new(pair[0], pair[1]))
            .collect();
        Self::new(samples, sample_rate, center_freq)
    }

    /// Samples in capture order
    #[inline]
    pub fn samples(&self) -> &[Complex<f32>] {
        &self.samples
    }

    /// Number of complex samples
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if the block holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample rate at capture time (Hz)
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Tuner center frequency at capture time (Hz)
    #[inline]
    pub fn center_freq(&self) -> u64 {
        self.center_freq
    }

    /// Consume the block, yielding its samples
    pub fn into_samples(self) -> Vec<Complex<f32>> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_interleaved() {
        let block = SampleBlock::from_interleaved(&[1.0, -1.0, 0.5, 0.25, 7.0], 48000, 100_000_000);
        assert_eq!(2, block.len());
        assert_eq!(Complex::new(1.0, -1.0), block.samples()[0]);
        assert_eq!(Complex::new(0.5, 0.25), block.samples()[1]);
        assert_eq!(48000, block.sample_rate());
        assert_eq!(100_000_000, block.center_freq());
    }
}
