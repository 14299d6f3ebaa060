//! Frequency scanning
//!
//! Drives a [`SampleSource`] across a tuning schedule and runs the
//! spectrum analysis chain at every step. Each step is an independent
//! capture window: a strong emitter near a step boundary may appear
//! in two adjacent entries, and entries are NOT deduplicated across
//! steps. A failed step records an empty detection list and the scan
//! continues; one bad retune never aborts a whole sweep.

#[cfg(not(test))]
use log::{info, warn};

#[cfg(test)]
use std::println as info;
#[cfg(test)]
use std::println as warn;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::average::SpectralAverage;
use crate::detect::{DetectedSignal, SignalClass, SignalDetector};
use crate::error::Error;
use crate::source::{tuner_gap, SampleSource};
use crate::spectrum::SpectrumAnalyzer;

/// Scan schedule and dwell parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanConfig {
    /// First step frequency, Hz
    pub start_hz: u64,
    /// Last step frequency, Hz (inclusive when reachable by `step_hz`)
    pub stop_hz: u64,
    /// Step size, Hz
    pub step_hz: u64,
    /// Time spent capturing at each step, seconds
    pub dwell: f32,
    /// Post-retune settling time, seconds; these samples are read and
    /// discarded so the PLL can lock and stale buffers drain
    pub settle: f32,
    /// Percentile of the averaged spectrum used as the noise floor
    pub noise_percentile: f32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start_hz: 88_000_000,
            stop_hz: 108_000_000,
            step_hz: 1_000_000,
            dwell: 0.1,
            settle: 0.05,
            noise_percentile: 10.0,
        }
    }
}

/// Detections at one scan step
#[derive(Clone, Debug, PartialEq)]
pub struct ScanEntry {
    /// Step center frequency, Hz
    pub frequency: u64,
    /// Signals detected in this step's capture window; empty when
    /// the step failed or nothing exceeded the threshold
    pub signals: Vec<DetectedSignal>,
}

/// Result of one scan invocation
///
/// Entries are ordered by ascending step frequency and the result is
/// immutable once the scan returns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanResult {
    entries: Vec<ScanEntry>,
}

impl ScanResult {
    /// Scan entries, ascending by frequency
    pub fn entries(&self) -> &[ScanEntry] {
        &self.entries
    }

    /// Number of steps recorded
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no steps were recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total signals across all steps
    pub fn total_signals(&self) -> usize {
        self.entries.iter().map(|e| e.signals.len()).sum()
    }

    /// Strongest signal found anywhere in the sweep
    pub fn strongest(&self) -> Option<&DetectedSignal> {
        self.entries
            .iter()
            .flat_map(|e| e.signals.iter())
            .max_by(|a, b| a.power.total_cmp(&b.power))
    }

    /// Signal counts per modulation class
    pub fn class_counts(&self) -> BTreeMap<SignalClass, usize> {
        let mut counts = BTreeMap::new();
        for signal in self.entries.iter().flat_map(|e| e.signals.iter()) {
            *counts.entry(signal.class).or_insert(0) += 1;
        }
        counts
    }
}

/// Sweeps a sample source across a frequency schedule
///
/// The dwell-and-capture loop is inherently sequential: only one
/// capture may be in flight against the shared tuner, so steps are
/// never parallelized.
#[derive(Clone, Debug)]
pub struct FrequencyScanner {
    analyzer: SpectrumAnalyzer,
    detector: SignalDetector,
    config: ScanConfig,
}

impl FrequencyScanner {
    /// Create a scanner from an analysis chain and a schedule
    pub fn new(analyzer: SpectrumAnalyzer, detector: SignalDetector, config: ScanConfig) -> Self {
        Self {
            analyzer,
            detector,
            config,
        }
    }

    /// Scan schedule in use
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run the sweep
    ///
    /// Retunes, settles, captures, and analyzes at every step of the
    /// schedule. `stop` is checked between steps; a raised stop flag
    /// ends the sweep early with the entries collected so far, so the
    /// source is released promptly.
    pub fn scan<S>(&self, source: &mut S, stop: &AtomicBool) -> ScanResult
    where
        S: SampleSource + ?Sized,
    {
        let step = self.config.step_hz.max(1);
        let steps = (self.config.stop_hz.saturating_sub(self.config.start_hz)) / step;

        let mut entries = Vec::with_capacity(steps as usize + 1);
        for i in 0..=steps {
            if stop.load(Ordering::Relaxed) {
                info!("scan cancelled after {} of {} steps", i, steps + 1);
                break;
            }

            let frequency = self.config.start_hz + i * step;
            if let Some(gap) = tuner_gap(frequency) {
                warn!(
                    "{} Hz falls in the {}; the tuner may not settle here",
                    frequency, gap.label
                );
            }

            let signals = match self.scan_step(source, frequency) {
                Ok(signals) => signals,
                Err(err) => {
                    warn!(
                        "scan step at {} Hz failed ({}); recording empty entry",
                        frequency, err
                    );
                    Vec::new()
                }
            };
            entries.push(ScanEntry { frequency, signals });
        }

        ScanResult { entries }
    }

    // one retune-settle-capture-analyze cycle
    fn scan_step<S>(&self, source: &mut S, frequency: u64) -> Result<Vec<DetectedSignal>, Error>
    where
        S: SampleSource + ?Sized,
    {
        source.set_frequency(frequency)?;

        let rate = source.status().sample_rate;
        let settle_samples = (rate as f64 * self.config.settle as f64) as usize;
        if settle_samples > 0 {
            // discard until the PLL settles
            source.read_samples(settle_samples)?;
        }

        let fft_size = self.analyzer.fft_size();
        let dwell_samples = (rate as f64 * self.config.dwell as f64) as usize;
        let captures = (dwell_samples / fft_size).max(1);

        let mut average = SpectralAverage::new();
        for _ in 0..captures {
            let block = source.read_samples(fft_size)?;
            average.update(&self.analyzer.process(&block)?);
        }

        let spectrum = average
            .averaged()
            .expect("at least one capture contributed");
        let floor = average
            .noise_floor(self.config.noise_percentile)
            .expect("noise floor follows from a non-empty average");
        Ok(self.detector.detect(&spectrum, floor))
    }
}
