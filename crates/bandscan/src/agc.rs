//! Automatic gain control

use num_complex::Complex;

/// Automatic gain control
///
/// The `Agc` steers a running gain multiplier toward a target output
/// amplitude with a single-tap feedback filter:
///
/// ```txt
/// gain += rate * (target - |input| * gain)
/// ```
///
/// The gain is clamped to `[min_gain, max_gain]` so silence or bursts
/// cannot destabilize it. A dead channel (zero amplitude) is not a
/// fault: the error term degenerates to `rate * target` and the gain
/// climbs toward `max_gain` at the configured rate.
///
/// The gain can be locked to keep it from changing once a signal has
/// been acquired.
#[derive(Clone, Copy, Debug)]
pub struct Agc {
    // update rate: higher → faster
    rate: f32,

    // desired output amplitude
    target: f32,

    min_gain: f32,
    max_gain: f32,

    // if true, the gain is frozen
    locked: bool,

    gain: f32,
}

impl Agc {
    /// New AGC
    ///
    /// `rate` is the loop update rate as a fraction of full
    /// correction per sample, clamped to `[0.0, 1.0]`. `target` is
    /// the desired output amplitude. The computed gain is clamped to
    /// between `min_gain` and `max_gain`.
    pub fn new(rate: f32, target: f32, min_gain: f32, max_gain: f32) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
            target,
            min_gain,
            max_gain,
            locked: false,
            gain: 1.0f32.clamp(min_gain, max_gain),
        }
    }

    /// Reset to initial conditions
    pub fn reset(&mut self) {
        self.gain = 1.0f32.clamp(self.min_gain, self.max_gain);
        self.locked = false;
    }

    /// Normalize one sample and update the gain
    #[inline]
    pub fn process(&mut self, input: Complex<f32>) -> Complex<f32> {
        let out = input * self.gain;
        if !self.locked {
            self.gain += self.rate * (self.target - out.norm());
            self.gain = self.gain.clamp(self.min_gain, self.max_gain);
        }
        out
    }

    /// Normalize a block of samples
    pub fn process_block(&mut self, input: &[Complex<f32>]) -> Vec<Complex<f32>> {
        input.iter().map(|&sample| self.process(sample)).collect()
    }

    /// Freeze or unfreeze the gain
    pub fn lock(&mut self, lock: bool) {
        self.locked = lock;
    }

    /// Current gain multiplier
    pub fn gain(&self) -> f32 {
        self.gain
    }
}
