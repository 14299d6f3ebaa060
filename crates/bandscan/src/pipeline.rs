//! Demodulation pipeline
//!
//! Wires AGC, a demodulator, and the rational resampler into one
//! session: IQ blocks in, resampled baseband out. The pipeline owns
//! every piece of per-session state and is built once per session
//! from its [`PipelineBuilder`]; switching modulation means building
//! a new pipeline.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Receiver;
use log::debug;

use crate::agc::Agc;
use crate::block::SampleBlock;
use crate::demod::{
    AmDemod, DemodState, Demodulator, FmDemod, GmskDemod, Modulation, DEEMPHASIS_NA,
};
use crate::resample::Resampler;

/// Consumes resampled baseband blocks
///
/// WAV encoding, file naming, and timestamping belong to the caller;
/// the pipeline only hands over samples.
pub trait AudioSink {
    fn write(&mut self, samples: &[f32]) -> io::Result<()>;
}

/// Collect output in memory
impl AudioSink for Vec<f32> {
    fn write(&mut self, samples: &[f32]) -> io::Result<()> {
        self.extend_from_slice(samples);
        Ok(())
    }
}

/// Builds a demodulation pipeline
///
/// Comes with sensible defaults for broadcast FM; the only mandatory
/// parameter is the IQ input rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineBuilder {
    input_rate: u32,
    output_rate: u32,
    modulation: Modulation,
    agc_rate: f32,
    agc_target: f32,
    agc_gain_limits: [f32; 2],
    deviation_hz: f32,
    deemphasis: f32,
    symbol_rate: u32,
}

impl PipelineBuilder {
    /// New builder for the given IQ input rate, in Hz
    pub fn new(input_rate: u32) -> Self {
        Self {
            input_rate,
            output_rate: 48_000,
            modulation: Modulation::Fm,
            agc_rate: 0.01,
            agc_target: 1.0,
            agc_gain_limits: [1.0e-4, 1.0e4],
            deviation_hz: 75_000.0,
            deemphasis: DEEMPHASIS_NA,
            symbol_rate: 9_600,
        }
    }

    /// Modulation to demodulate (default FM)
    pub fn with_modulation(&mut self, modulation: Modulation) -> &mut Self {
        self.modulation = modulation;
        self
    }

    /// Audio output rate, in Hz (default 48000)
    ///
    /// Ignored for GMSK, whose output is one soft bit per symbol.
    pub fn with_output_rate(&mut self, rate: u32) -> &mut Self {
        self.output_rate = rate.max(1);
        self
    }

    /// AGC update rate (default 0.01, clamped to `[0.0, 1.0]`)
    pub fn with_agc_rate(&mut self, rate: f32) -> &mut Self {
        self.agc_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// AGC gain clamp range (default `[1e-4, 1e4]`)
    pub fn with_agc_gain_limits(&mut self, min: f32, max: f32) -> &mut Self {
        self.agc_gain_limits = [min, max.max(min)];
        self
    }

    /// FM peak deviation, in Hz (default 75 kHz)
    pub fn with_deviation(&mut self, deviation_hz: f32) -> &mut Self {
        self.deviation_hz = deviation_hz.max(1.0);
        self
    }

    /// FM de-emphasis time constant, in seconds (default 75 µs)
    pub fn with_deemphasis(&mut self, tau: f32) -> &mut Self {
        self.deemphasis = tau.max(1.0e-6);
        self
    }

    /// GMSK symbol rate, in Hz (default 9600)
    pub fn with_symbol_rate(&mut self, symbol_rate: u32) -> &mut Self {
        self.symbol_rate = symbol_rate.max(1);
        self
    }

    /// Build a pipeline, ready to process blocks
    pub fn build(&self) -> DemodPipeline {
        let agc = Agc::new(
            self.agc_rate,
            self.agc_target,
            self.agc_gain_limits[0],
            self.agc_gain_limits[1],
        );

        let demod: Box<dyn Demodulator> = match self.modulation {
            Modulation::Fm => Box::new(FmDemod::new(
                self.input_rate,
                self.deviation_hz,
                self.deemphasis,
            )),
            Modulation::Am => Box::new(AmDemod::new(self.input_rate)),
            Modulation::Gmsk => Box::new(GmskDemod::new(self.input_rate, self.symbol_rate)),
        };

        // soft bits are already at the symbol rate; audio is
        // resampled from the demodulator's native rate
        let resampler = match self.modulation {
            Modulation::Gmsk => Resampler::new(self.symbol_rate, self.symbol_rate),
            _ => Resampler::new(demod.output_rate(), self.output_rate),
        };

        DemodPipeline {
            modulation: self.modulation,
            input_rate: self.input_rate,
            state: DemodState::new(agc),
            demod,
            resampler,
            blocks_in: 0,
        }
    }
}

/// One demodulation session
///
/// AGC → demodulator → resampler. All mutable state is owned here,
/// so two sessions against two devices never interfere.
pub struct DemodPipeline {
    modulation: Modulation,
    input_rate: u32,
    demod: Box<dyn Demodulator>,
    state: DemodState,
    resampler: Resampler,
    blocks_in: u64,
}

impl DemodPipeline {
    /// Modulation this session demodulates
    pub fn modulation(&self) -> Modulation {
        self.modulation
    }

    /// Expected IQ input rate, Hz
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Output sample rate, Hz
    ///
    /// The audio rate, or the symbol rate for GMSK.
    pub fn output_rate(&self) -> u32 {
        self.resampler.output_rate()
    }

    /// Current AGC gain
    pub fn gain(&self) -> f32 {
        self.state.gain()
    }

    /// Lifetime count of processed blocks
    pub fn blocks_in(&self) -> u64 {
        self.blocks_in
    }

    /// Process one IQ block into resampled baseband
    pub fn process(&mut self, block: &SampleBlock) -> Vec<f32> {
        self.blocks_in = self.blocks_in.wrapping_add(1);
        let leveled = self.state.agc.process_block(block.samples());
        let baseband = self.demod.demodulate(&leveled, &mut self.state);
        self.resampler.process(&baseband)
    }

    /// Run the session over a queue of captured blocks
    ///
    /// Processes until the queue disconnects (capture stopped or
    /// device failed) or `stop` is raised; the flag is checked
    /// between blocks. Returns the number of output samples written
    /// to the sink.
    pub fn run<S>(
        &mut self,
        blocks: &Receiver<SampleBlock>,
        sink: &mut S,
        stop: &AtomicBool,
    ) -> io::Result<u64>
    where
        S: AudioSink + ?Sized,
    {
        let mut written = 0u64;
        for block in blocks.iter() {
            if stop.load(Ordering::Relaxed) {
                debug!("demodulation stopped after {} blocks", self.blocks_in);
                break;
            }
            let out = self.process(&block);
            sink.write(&out)?;
            written += out.len() as u64;
        }
        Ok(written)
    }

    /// Reset all per-session state to initial conditions
    pub fn reset(&mut self) {
        self.state.reset();
        self.resampler.reset();
        self.blocks_in = 0;
    }
}

impl std::fmt::Debug for DemodPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemodPipeline")
            .field("modulation", &self.modulation)
            .field("input_rate", &self.input_rate)
            .field("output_rate", &self.output_rate())
            .field("blocks_in", &self.blocks_in)
            .finish()
    }
}
