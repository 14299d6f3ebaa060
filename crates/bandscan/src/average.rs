//! Spectral averaging and noise floor estimation
//!
//! Incoherent averaging of power spectra beats the noise down without
//! touching the underlying FFT. The accumulator keeps a running mean
//! and a peak-hold trace; the noise floor is a lower percentile of
//! the mean, which tolerates both noise spikes (unlike the minimum)
//! and strong signals (unlike the mean).

use log::debug;

use crate::spectrum::PowerSpectrum;

/// Running average of power spectra
///
/// Feeding a spectrum whose length differs from the accumulated one
/// discards the history and restarts the average. This is the
/// required behavior for FFT-size changes mid-session: bins must
/// never be silently misaligned.
#[derive(Clone, Debug, Default)]
pub struct SpectralAverage {
    mean: Vec<f32>,
    peak_hold: Vec<f32>,
    count: u32,
    center_freq: u64,
    bin_hz: f64,
}

impl SpectralAverage {
    /// New, empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of spectra contributing to the current mean
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Fold one spectrum into the average
    pub fn update(&mut self, spectrum: &PowerSpectrum) {
        if self.mean.len() != spectrum.len() {
            if !self.mean.is_empty() {
                debug!(
                    "spectrum length changed {} -> {}; restarting average",
                    self.mean.len(),
                    spectrum.len()
                );
            }
            self.mean = spectrum.power_db().to_vec();
            self.peak_hold = self.mean.clone();
            self.count = 1;
        } else {
            self.count += 1;
            let weight = 1.0 / self.count as f32;
            for ((mean, peak), &db) in self
                .mean
                .iter_mut()
                .zip(self.peak_hold.iter_mut())
                .zip(spectrum.power_db())
            {
                *mean += (db - *mean) * weight;
                *peak = peak.max(db);
            }
        }
        self.center_freq = spectrum.center_freq();
        self.bin_hz = spectrum.bin_hz();
    }

    /// The averaged spectrum, if any updates have been applied
    pub fn averaged(&self) -> Option<PowerSpectrum> {
        if self.count == 0 {
            None
        } else {
            Some(PowerSpectrum::new(
                self.mean.clone(),
                self.center_freq,
                self.bin_hz,
            ))
        }
    }

    /// Peak-hold bin powers, lowest frequency first
    pub fn peak_hold(&self) -> &[f32] {
        &self.peak_hold
    }

    /// Re-seed the peak-hold trace from the current mean
    pub fn clear_peak_hold(&mut self) {
        self.peak_hold = self.mean.clone();
    }

    /// Estimate the noise floor, in dB
    ///
    /// Returns the `percentile`-th percentile (0–100) of the
    /// averaged bin powers, or `None` before the first update.
    pub fn noise_floor(&self, percentile: f32) -> Option<f32> {
        if self.count == 0 {
            return None;
        }
        let mut sorted = self.mean.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let pos = (percentile.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
        Some(sorted[pos.round() as usize])
    }

    /// Discard all accumulated history
    pub fn reset(&mut self) {
        self.mean.clear();
        self.peak_hold.clear();
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    fn spectrum_of(bins: Vec<f32>) -> PowerSpectrum {
        PowerSpectrum::new(bins, 100_000_000, 1000.0)
    }

    #[test]
    fn test_running_mean() {
        let mut avg = SpectralAverage::new();
        avg.update(&spectrum_of(vec![0.0; 8]));
        avg.update(&spectrum_of(vec![-10.0; 8]));
        assert_eq!(2, avg.count());

        let mean = avg.averaged().unwrap();
        for &db in mean.power_db() {
            assert_approx_eq!(-5.0f32, db);
        }
        // peak hold keeps the stronger frame
        for &db in avg.peak_hold() {
            assert_approx_eq!(0.0f32, db);
        }
    }

    #[test]
    fn test_reset_on_size_change() {
        let mut avg = SpectralAverage::new();
        for _ in 0..5 {
            avg.update(&spectrum_of(vec![-40.0; 1024]));
        }
        assert_eq!(5, avg.count());

        // an FFT-size change must restart the average, not blend
        avg.update(&spectrum_of(vec![-90.0; 512]));
        assert_eq!(1, avg.count());
        let mean = avg.averaged().unwrap();
        assert_eq!(512, mean.len());
        for &db in mean.power_db() {
            assert_approx_eq!(-90.0f32, db);
        }
    }

    #[test]
    fn test_noise_floor_percentile() {
        let mut avg = SpectralAverage::new();
        assert_eq!(None, avg.noise_floor(10.0));

        // bins 0..100 dB: the 10th percentile sits near 10 dB and is
        // neither the minimum nor the mean
        let bins: Vec<f32> = (0..100).map(|i| i as f32).collect();
        avg.update(&spectrum_of(bins));
        let floor = avg.noise_floor(10.0).unwrap();
        assert_approx_eq!(10.0f32, floor, 1.0);
        assert!(floor > 0.0);
        assert!(floor < 49.5);
    }

    #[test]
    fn test_clear_peak_hold() {
        let mut avg = SpectralAverage::new();
        avg.update(&spectrum_of(vec![0.0; 4]));
        avg.update(&spectrum_of(vec![-20.0; 4]));
        avg.clear_peak_hold();
        for (&peak, &mean) in avg.peak_hold().iter().zip(&[-10.0f32; 4]) {
            assert_approx_eq!(mean, peak);
        }
    }
}
