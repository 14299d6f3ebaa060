//! Peak detection and signal classification
//!
//! Scans an averaged [`PowerSpectrum`] for local maxima above the
//! noise floor, merges neighboring candidates into one signal, and
//! attaches a coarse modulation guess plus a known band allocation
//! label where the frequency falls inside one.

use strum_macros::Display;

use crate::spectrum::PowerSpectrum;

/// Coarse modulation guess, from occupied bandwidth alone
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalClass {
    /// Very narrow carrier (< 200 Hz)
    #[strum(serialize = "CW")]
    Cw,
    /// Narrowband FM voice (< 3 kHz)
    #[strum(serialize = "NFM")]
    NarrowFm,
    /// AM or narrow FM (< 10 kHz)
    #[strum(serialize = "AM/NFM")]
    AmOrNfm,
    /// Broadcast FM (< 200 kHz)
    #[strum(serialize = "WFM")]
    WideFm,
    /// Wideband digital or video
    #[strum(serialize = "wideband")]
    Wideband,
}

impl SignalClass {
    /// Classify from the occupied bandwidth, in Hz
    pub fn from_bandwidth(bandwidth_hz: f64) -> Self {
        if bandwidth_hz < 200.0 {
            SignalClass::Cw
        } else if bandwidth_hz < 3_000.0 {
            SignalClass::NarrowFm
        } else if bandwidth_hz < 10_000.0 {
            SignalClass::AmOrNfm
        } else if bandwidth_hz < 200_000.0 {
            SignalClass::WideFm
        } else {
            SignalClass::Wideband
        }
    }
}

// well-known allocations, low/high edges in Hz
const KNOWN_BANDS: &[(u64, u64, &str)] = &[
    (535_000, 1_705_000, "AM broadcast"),
    (14_000_000, 14_350_000, "20m amateur"),
    (88_000_000, 108_000_000, "FM broadcast"),
    (108_000_000, 137_000_000, "aviation"),
    (144_000_000, 148_000_000, "2m amateur"),
    (156_000_000, 162_500_000, "marine VHF"),
    (161_975_000, 162_025_000, "AIS"),
    (430_000_000, 440_000_000, "70cm amateur"),
    (433_050_000, 434_790_000, "ISM 433"),
    (902_000_000, 928_000_000, "ISM 900"),
    (978_000_000, 978_000_000, "UAT"),
    (1_090_000_000, 1_090_000_000, "ADS-B"),
];

/// Look up a known band allocation containing `freq_hz`
pub fn known_band(freq_hz: f64) -> Option<&'static str> {
    let freq = freq_hz.round() as u64;
    KNOWN_BANDS
        .iter()
        .find(|&&(low, high, _)| freq >= low && freq <= high)
        .map(|&(_, _, label)| label)
}

/// One detected emitter
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedSignal {
    /// Absolute frequency of the strongest bin, Hz
    pub frequency: f64,
    /// Peak power, dB
    pub power: f32,
    /// Width over which power stays within 3 dB of the peak, Hz
    pub bandwidth: f64,
    /// Peak power over the noise floor, dB
    pub snr: f32,
    /// Bandwidth-based modulation guess
    pub class: SignalClass,
    /// Known allocation containing this frequency, if any
    pub band: Option<&'static str>,
}

/// Peak detector over averaged spectra
///
/// A bin is a candidate when it exceeds both immediate neighbors and
/// `noise_floor + threshold_db`. Candidates closer together than the
/// merge tolerance collapse into one signal centered on the bin of
/// maximum power, so a wide emitter is not reported as many narrow
/// ones. Output is sorted by frequency ascending and is identical
/// for identical input.
#[derive(Clone, Copy, Debug)]
pub struct SignalDetector {
    threshold_db: f32,
    merge_hz: f64,
}

impl SignalDetector {
    /// Create a detector
    ///
    /// `threshold_db` is the required margin over the noise floor;
    /// `merge_hz` is the tolerance within which neighboring candidate
    /// peaks are considered one signal.
    pub fn new(threshold_db: f32, merge_hz: f64) -> Self {
        Self {
            threshold_db,
            merge_hz: merge_hz.max(0.0),
        }
    }

    /// Detection margin over the noise floor, dB
    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    /// Detect signals in an averaged spectrum
    pub fn detect(&self, spectrum: &PowerSpectrum, noise_floor: f32) -> Vec<DetectedSignal> {
        let power = spectrum.power_db();
        if power.len() < 3 {
            return Vec::new();
        }
        let threshold = noise_floor + self.threshold_db;

        // local maxima above the threshold, ascending
        let candidates: Vec<usize> = (1..power.len() - 1)
            .filter(|&bin| {
                power[bin] > threshold
                    && power[bin] > power[bin - 1]
                    && power[bin] > power[bin + 1]
            })
            .collect();

        let merge_bins = (self.merge_hz / spectrum.bin_hz()).round() as usize;
        let mut signals = Vec::new();
        let mut group: Vec<usize> = Vec::new();
        for &bin in &candidates {
            match group.last() {
                Some(&last) if bin - last <= merge_bins.max(1) => group.push(bin),
                Some(_) => {
                    signals.push(self.emit(spectrum, &group, noise_floor));
                    group.clear();
                    group.push(bin);
                }
                None => group.push(bin),
            }
        }
        if !group.is_empty() {
            signals.push(self.emit(spectrum, &group, noise_floor));
        }
        signals
    }

    // build one DetectedSignal from a group of merged candidate bins
    fn emit(&self, spectrum: &PowerSpectrum, group: &[usize], noise_floor: f32) -> DetectedSignal {
        let power = spectrum.power_db();
        let peak_bin = group
            .iter()
            .copied()
            .max_by(|&a, &b| power[a].total_cmp(&power[b]))
            .expect("candidate group is never empty");
        let peak_power = power[peak_bin];

        // 3 dB points around the peak
        let cutoff = peak_power - 3.0;
        let mut left = peak_bin;
        while left > 0 && power[left] > cutoff {
            left -= 1;
        }
        let mut right = peak_bin;
        while right < power.len() - 1 && power[right] > cutoff {
            right += 1;
        }
        let bandwidth = (right - left) as f64 * spectrum.bin_hz();

        let frequency = spectrum.frequency(peak_bin);
        DetectedSignal {
            frequency,
            power: peak_power,
            bandwidth,
            snr: peak_power - noise_floor,
            class: SignalClass::from_bandwidth(bandwidth),
            band: known_band(frequency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    use crate::average::SpectralAverage;
    use crate::spectrum::testutil::tone_block;
    use crate::spectrum::{SpectrumAnalyzer, WindowKind};

    fn flat_spectrum(len: usize, floor_db: f32) -> Vec<f32> {
        vec![floor_db; len]
    }

    #[test]
    fn test_detects_and_merges_wide_peak() {
        // a rippled 5-bin hump has TWO local maxima (101 and 103);
        // they must merge into ONE reported signal
        let mut bins = flat_spectrum(256, -90.0);
        for (offset, &db) in [-55.0, -50.0, -54.0, -51.0, -56.0].iter().enumerate() {
            bins[100 + offset] = db;
        }
        let spectrum = PowerSpectrum::new(bins, 100_000_000, 1000.0);

        let detector = SignalDetector::new(10.0, 5_000.0);
        let signals = detector.detect(&spectrum, -90.0);
        assert_eq!(1, signals.len());

        let sig = &signals[0];
        // centered on the strongest of the merged maxima
        assert_approx_eq!(spectrum.frequency(101), sig.frequency, 1.0e-6);
        assert_approx_eq!(-50.0f32, sig.power);
        assert_approx_eq!(40.0f32, sig.snr);
        // the 3 dB walk stops at the first bin at or below -53 dB on
        // each side (100 and 102)
        assert_approx_eq!(2000.0f64, sig.bandwidth, 1.0e-6);
        assert_eq!(SignalClass::NarrowFm, sig.class);
        assert_eq!(Some("FM broadcast"), sig.band);
    }

    #[test]
    fn test_separate_signals_stay_separate() {
        let mut bins = flat_spectrum(256, -90.0);
        bins[40] = -50.0;
        bins[200] = -45.0;
        let spectrum = PowerSpectrum::new(bins, 100_000_000, 1000.0);

        let detector = SignalDetector::new(10.0, 5_000.0);
        let signals = detector.detect(&spectrum, -90.0);
        assert_eq!(2, signals.len());
        // ascending frequency order
        assert!(signals[0].frequency < signals[1].frequency);
    }

    #[test]
    fn test_below_threshold_ignored() {
        let mut bins = flat_spectrum(128, -90.0);
        bins[64] = -85.0;
        let spectrum = PowerSpectrum::new(bins, 100_000_000, 1000.0);

        let detector = SignalDetector::new(10.0, 5_000.0);
        assert!(detector.detect(&spectrum, -90.0).is_empty());
    }

    #[test]
    fn test_determinism() {
        let mut bins = flat_spectrum(256, -88.0);
        bins[30] = -40.0;
        bins[31] = -42.0;
        bins[140] = -60.0;
        let spectrum = PowerSpectrum::new(bins, 433_500_000, 500.0);

        let detector = SignalDetector::new(12.0, 2_000.0);
        let first = detector.detect(&spectrum, -88.0);
        let second = detector.detect(&spectrum, -88.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_sinusoid_through_full_analysis_chain() {
        // a clean tone through FFT -> average -> detect must yield
        // exactly one signal within one bin width of the tone
        const FS: u32 = 1_024_000;
        const N: usize = 1024;
        const OFFSET: f64 = 100_000.0;
        const CENTER: u64 = 100_000_000;

        let analyzer = SpectrumAnalyzer::new(N, WindowKind::Hann);
        let mut avg = SpectralAverage::new();
        for _ in 0..4 {
            let block = tone_block(N, FS, CENTER, OFFSET, 1.0, 1.0e-3);
            avg.update(&analyzer.process(&block).unwrap());
        }

        let spectrum = avg.averaged().unwrap();
        let floor = avg.noise_floor(10.0).unwrap();
        let detector = SignalDetector::new(30.0, 5_000.0);
        let signals = detector.detect(&spectrum, floor);

        assert_eq!(1, signals.len());
        let expected = CENTER as f64 + OFFSET;
        assert!((signals[0].frequency - expected).abs() <= spectrum.bin_hz());
        assert!(signals[0].snr > 30.0);
        assert_eq!(Some("FM broadcast"), signals[0].band);
    }

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(SignalClass::Cw, SignalClass::from_bandwidth(100.0));
        assert_eq!(SignalClass::NarrowFm, SignalClass::from_bandwidth(2_500.0));
        assert_eq!(SignalClass::AmOrNfm, SignalClass::from_bandwidth(8_000.0));
        assert_eq!(SignalClass::WideFm, SignalClass::from_bandwidth(150_000.0));
        assert_eq!(SignalClass::Wideband, SignalClass::from_bandwidth(2.0e6));
        assert_eq!("WFM", SignalClass::WideFm.to_string());
    }

    #[test]
    fn test_known_band() {
        assert_eq!(Some("ADS-B"), known_band(1_090_000_000.0));
        assert_eq!(Some("AIS"), known_band(162_000_000.0));
        assert_eq!(None, known_band(50_000_000.0));
    }
}
