//! Demodulation
//!
//! A [`Demodulator`] converts a gain-normalized complex sample stream
//! into a real baseband signal: audio for FM and AM, soft bit
//! decisions for GMSK. One implementation exists per modulation and
//! is selected at session start, never swapped mid-stream.
//!
//! Demodulators are immutable; every scrap of mutable state lives in
//! the [`DemodState`] passed into each call. Nothing is retained
//! across blocks outside that state, which keeps the call boundary
//! stateless and the variants trivially testable.

use num_complex::Complex;
use strum_macros::{Display, EnumString};

use crate::agc::Agc;

/// Modulation selection
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Modulation {
    Fm,
    Am,
    Gmsk,
}

/// Per-session demodulator state
///
/// Holds the AGC gain, the previous-sample phase reference for the
/// quadrature discriminator, and filter memory for de-emphasis and
/// DC tracking. Owned by exactly one active session and reset on
/// reconnect or mode switch.
#[derive(Clone, Debug)]
pub struct DemodState {
    pub(crate) agc: Agc,
    // phase reference for the conjugate-product discriminator
    pub(crate) prev: Complex<f32>,
    // one-pole de-emphasis memory
    pub(crate) deemph: f32,
    // tracked DC estimate of the AM envelope
    pub(crate) dc: f32,
    // fractional samples into the current GMSK symbol
    pub(crate) symbol_clock: f32,
}

impl DemodState {
    /// New state with the given gain control
    pub fn new(agc: Agc) -> Self {
        Self {
            agc,
            prev: Complex::new(1.0, 0.0),
            deemph: 0.0,
            dc: 0.0,
            symbol_clock: 0.0,
        }
    }

    /// Current AGC gain
    pub fn gain(&self) -> f32 {
        self.agc.gain()
    }

    /// Reset all state to initial conditions
    pub fn reset(&mut self) {
        self.agc.reset();
        self.prev = Complex::new(1.0, 0.0);
        self.deemph = 0.0;
        self.dc = 0.0;
        self.symbol_clock = 0.0;
    }
}

/// Converts complex samples into a real baseband signal
pub trait Demodulator {
    /// Demodulate one block
    ///
    /// Consumes gain-normalized IQ samples and the session state,
    /// returning the real-valued output block. The state carries
    /// everything that must survive to the next call.
    fn demodulate(&self, iq: &[Complex<f32>], state: &mut DemodState) -> Vec<f32>;

    /// Output sample rate, Hz
    ///
    /// Equal to the input rate for FM and AM; the symbol rate for
    /// GMSK.
    fn output_rate(&self) -> u32;
}

/// FM quadrature discriminator with de-emphasis
///
/// The instantaneous frequency is the angle of the conjugate product
/// of consecutive samples. Working on the wrapped angle directly
/// avoids phase-unwrap discontinuities. Output is scaled so full
/// deviation maps to ±1.0, then run through a one-pole de-emphasis
/// filter that undoes the transmitter's pre-emphasis.
#[derive(Clone, Copy, Debug)]
pub struct FmDemod {
    sample_rate: u32,
    // deviation normalization: rad/sample → fraction of full deviation
    gain: f32,
    // one-pole de-emphasis coefficients, y = b*x + a*y
    deemph_a: f32,
    deemph_b: f32,
}

/// De-emphasis time constant for North American broadcast FM
pub const DEEMPHASIS_NA: f32 = 75.0e-6;

/// De-emphasis time constant for European broadcast FM
pub const DEEMPHASIS_EU: f32 = 50.0e-6;

impl FmDemod {
    /// Create an FM demodulator
    ///
    /// `deviation_hz` is the peak deviation (75 kHz for broadcast
    /// FM); `tau` is the de-emphasis time constant in seconds,
    /// usually [`DEEMPHASIS_NA`] or [`DEEMPHASIS_EU`].
    pub fn new(sample_rate: u32, deviation_hz: f32, tau: f32) -> Self {
        let decay = (-1.0 / (sample_rate as f32 * tau)).exp();
        Self {
            sample_rate,
            gain: sample_rate as f32 / (2.0 * std::f32::consts::PI * deviation_hz),
            deemph_a: decay,
            deemph_b: 1.0 - decay,
        }
    }
}

impl Demodulator for FmDemod {
    fn demodulate(&self, iq: &[Complex<f32>], state: &mut DemodState) -> Vec<f32> {
        let mut out = Vec::with_capacity(iq.len());
        for &sample in iq {
            let dphi = (sample * state.prev.conj()).arg();
            state.prev = sample;

            state.deemph = self.deemph_b * (dphi * self.gain) + self.deemph_a * state.deemph;
            out.push(state.deemph);
        }
        out
    }

    fn output_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// AM envelope detector
///
/// Takes the magnitude of each sample and subtracts a slowly tracked
/// running mean, leaving the modulation depth with the carrier's DC
/// component removed.
#[derive(Clone, Copy, Debug)]
pub struct AmDemod {
    sample_rate: u32,
    // DC tracker update rate per sample
    dc_rate: f32,
}

impl AmDemod {
    // corner frequency of the DC tracker; well below any audio
    const DC_TRACK_HZ: f32 = 10.0;

    /// Create an AM demodulator for the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        let dc_rate = 2.0 * std::f32::consts::PI * Self::DC_TRACK_HZ / sample_rate as f32;
        Self {
            sample_rate,
            dc_rate: dc_rate.min(1.0),
        }
    }
}

impl Demodulator for AmDemod {
    fn demodulate(&self, iq: &[Complex<f32>], state: &mut DemodState) -> Vec<f32> {
        let mut out = Vec::with_capacity(iq.len());
        for &sample in iq {
            let envelope = sample.norm();
            state.dc += self.dc_rate * (envelope - state.dc);
            out.push(envelope - state.dc);
        }
        out
    }

    fn output_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Simplified GMSK front end
///
/// Quadrature demodulation as in FM, sampled once per symbol by a
/// fractional symbol clock, emitting one soft bit decision in
/// `[-1.0, 1.0]` per symbol. This is an approximation: there is no
/// Gaussian matched filter and no timing recovery, so expect reduced
/// accuracy versus a full receiver. Downstream protocol decoders
/// consume the soft bits.
#[derive(Clone, Copy, Debug)]
pub struct GmskDemod {
    symbol_rate: u32,
    samples_per_symbol: f32,
    // scales the per-sample phase increment so that the nominal
    // GMSK deviation (±π/2 per symbol) maps to ±1.0
    gain: f32,
}

impl GmskDemod {
    /// Create a GMSK demodulator
    ///
    /// `sample_rate` must be at least the `symbol_rate`.
    pub fn new(sample_rate: u32, symbol_rate: u32) -> Self {
        let sps = sample_rate as f32 / symbol_rate as f32;
        Self {
            symbol_rate,
            samples_per_symbol: sps,
            gain: 2.0 * sps / std::f32::consts::PI,
        }
    }

    /// Nominal samples per symbol
    pub fn samples_per_symbol(&self) -> f32 {
        self.samples_per_symbol
    }
}

impl Demodulator for GmskDemod {
    fn demodulate(&self, iq: &[Complex<f32>], state: &mut DemodState) -> Vec<f32> {
        let mut out = Vec::with_capacity(
            (iq.len() as f32 / self.samples_per_symbol).ceil() as usize + 1,
        );
        for &sample in iq {
            let dphi = (sample * state.prev.conj()).arg();
            state.prev = sample;

            state.symbol_clock += 1.0;
            if state.symbol_clock >= self.samples_per_symbol {
                state.symbol_clock -= self.samples_per_symbol;
                out.push((dphi * self.gain).clamp(-1.0, 1.0));
            }
        }
        out
    }

    fn output_rate(&self) -> u32 {
        self.symbol_rate
    }
}
