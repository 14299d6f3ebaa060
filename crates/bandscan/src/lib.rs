//! # bandscan: spectrum scanning and IQ demodulation
//!
//! This crate is the real-time DSP core of a software radio control
//! front-end. It turns a stream of complex IQ samples from a tuner
//! into actionable signal information:
//!
//! * a frequency-domain power spectrum, with incoherent averaging
//!   and noise-floor estimation;
//! * a deduplicated list of detected signals with bandwidth, SNR,
//!   and a coarse modulation guess;
//! * demodulated audio (FM with de-emphasis, AM envelope), rationally
//!   resampled to an audio output rate; and
//! * soft baseband bits from a simplified GMSK front end, for
//!   external protocol decoders to consume.
//!
//! Device drivers, decoder subprocesses, and file writers are
//! collaborators behind narrow traits ([`SampleSource`],
//! [`AudioSink`]); this crate owns only the signal path.
//!
//! ## Spectrum analysis
//!
//! ```
//! use bandscan::{SampleBlock, SignalDetector, SpectralAverage, SpectrumAnalyzer, WindowKind};
//!
//! let analyzer = SpectrumAnalyzer::new(2048, WindowKind::Hann);
//! let detector = SignalDetector::new(10.0, 10_000.0);
//! let mut average = SpectralAverage::new();
//!
//! // interleaved I/Q floats, e.g. read from a tuner at 2.048 MS/s
//! let iq = vec![0.0f32; 4096];
//! let block = SampleBlock::from_interleaved(&iq, 2_048_000, 100_000_000);
//!
//! average.update(&analyzer.process(&block)?);
//! let spectrum = average.averaged().unwrap();
//! let floor = average.noise_floor(10.0).unwrap();
//! for signal in detector.detect(&spectrum, floor) {
//!     println!("{:.3} MHz: {:.1} dB SNR", signal.frequency / 1.0e6, signal.snr);
//! }
//! # Ok::<(), bandscan::Error>(())
//! ```
//!
//! ## Demodulation
//!
//! ```
//! use bandscan::{Modulation, PipelineBuilder, SampleBlock};
//!
//! let mut pipeline = PipelineBuilder::new(240_000)
//!     .with_modulation(Modulation::Fm)
//!     .with_output_rate(48_000)
//!     .build();
//!
//! let iq = vec![0.0f32; 48_000];
//! let block = SampleBlock::from_interleaved(&iq, 240_000, 100_300_000);
//! let audio = pipeline.process(&block);
//! assert_eq!(block.len() / 5, audio.len());
//! ```
//!
//! Scanning a band drives a [`SampleSource`] across a schedule with
//! a [`FrequencyScanner`]; live capture runs the device on its own
//! thread behind a bounded queue via [`spawn_capture`], dropping the
//! oldest block on overrun so monitoring stays fresh under load.
//!
//! Analysis and demodulation are mutually exclusive consumers of one
//! tuner within a session: the hardware exposes a single stream.

mod agc;
mod average;
mod block;
mod capture;
mod demod;
mod detect;
mod error;
mod filter;
mod pipeline;
mod resample;
mod scan;
mod source;
mod spectrum;

pub use agc::Agc;
pub use average::SpectralAverage;
pub use block::SampleBlock;
pub use capture::{spawn_capture, CaptureHandle};
pub use demod::{
    AmDemod, DemodState, Demodulator, FmDemod, GmskDemod, Modulation, DEEMPHASIS_EU, DEEMPHASIS_NA,
};
pub use detect::{known_band, DetectedSignal, SignalClass, SignalDetector};
pub use error::Error;
pub use pipeline::{AudioSink, DemodPipeline, PipelineBuilder};
pub use resample::Resampler;
pub use scan::{FrequencyScanner, ScanConfig, ScanEntry, ScanResult};
pub use source::{tuner_gap, Gain, HardwareError, SampleSource, TunerGap, TunerStatus};
pub use spectrum::{PowerSpectrum, SpectrumAnalyzer, WindowKind};
