//! FIR filter primitives
//!
//! A [`FirCoeff`] holds an impulse response and performs the
//! multiply-accumulate half of FIR convolution against a caller-owned
//! sample history. The history slice is ordered oldest-first, with the
//! most recent sample last; coefficients are stored reversed so the
//! accumulate is a straight element-wise pass.
//!
//! [`lowpass_taps`] designs windowed-sinc low-pass prototypes for the
//! resampler's anti-aliasing and interpolation kernel.

use nalgebra::DVector;
use num_traits::Zero;

/// FIR filter coefficients
///
/// Coefficients are stored in reverse order so that they can be
/// multiplied element-wise against an oldest-first history window.
#[derive(Clone, Debug, PartialEq)]
pub struct FirCoeff(DVector<f32>);

#[allow(dead_code)]
impl FirCoeff {
    /// Create from an impulse response
    ///
    /// `h` uses the usual convolution ordering (`h[0]` applies to the
    /// newest sample); it is reversed internally.
    pub fn from_taps<S>(h: S) -> Self
    where
        S: AsRef<[f32]>,
    {
        let h = h.as_ref();
        FirCoeff(DVector::from_iterator(h.len(), h.iter().rev().copied()))
    }

    /// Number of taps
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-tap filter
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all taps (DC gain)
    pub fn dc_gain(&self) -> f32 {
        self.0.iter().sum()
    }

    /// Scale every tap by `scale`
    pub fn scale(&mut self, scale: f32) {
        for tap in self.0.iter_mut() {
            *tap *= scale;
        }
    }

    /// Multiply-accumulate against a sample history
    ///
    /// `history[0]` is the oldest sample and `history[len - 1]` the
    /// newest. If the lengths differ, the excess of the longer slice
    /// is ignored at its old end; missing history is treated as zero.
    pub fn filter(&self, history: &[f32]) -> f32 {
        let rev = self.0.as_slice();
        let n = usize::min(history.len(), rev.len());
        let history = &history[history.len() - n..];
        let rev = &rev[rev.len() - n..];

        let mut acc = 0.0f32;
        for (sample, tap) in history.iter().zip(rev.iter()) {
            acc += sample * tap;
        }
        acc
    }
}

/// Sliding sample history for FIR filtering
///
/// Fixed length, zero-initialized. Samples are pushed at the new end
/// and age off the old end. The contents are always available as an
/// oldest-first slice for [`FirCoeff::filter`].
#[derive(Clone, Debug)]
pub struct History<T>(Vec<T>)
where
    T: Copy + Zero;

impl<T> History<T>
where
    T: Copy + Zero,
{
    /// Create a zero-filled history of `len` samples
    pub fn new(len: usize) -> Self {
        Self(vec![T::zero(); len])
    }

    /// Push one sample, aging off the oldest
    #[inline]
    pub fn push(&mut self, sample: T) {
        self.0.rotate_left(1);
        if let Some(newest) = self.0.last_mut() {
            *newest = sample;
        }
    }

    /// Contents, oldest first
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        self.0.fill(T::zero());
    }
}

/// Design a windowed-sinc low-pass prototype
///
/// Returns `len` taps of a Hann-windowed sinc with the given
/// `cutoff`, expressed in cycles per sample (`0 < cutoff <= 0.5`),
/// scaled to a DC gain of `gain`.
pub fn lowpass_taps(len: usize, cutoff: f32, gain: f32) -> Vec<f32> {
    assert!(len > 0);
    let center = (len as f32 - 1.0) / 2.0;
    let mut taps: Vec<f32> = (0..len)
        .map(|i| {
            let t = i as f32 - center;
            let window = hann(i, len);
            sinc(2.0 * cutoff * t) * 2.0 * cutoff * window
        })
        .collect();

    // normalize the truncated kernel to the requested DC gain
    let sum: f32 = taps.iter().sum();
    if sum.abs() > f32::EPSILON {
        let scale = gain / sum;
        for tap in taps.iter_mut() {
            *tap *= scale;
        }
    }
    taps
}

#[inline]
fn sinc(x: f32) -> f32 {
    if x.abs() < 1.0e-6 {
        1.0
    } else {
        let px = std::f32::consts::PI * x;
        px.sin() / px
    }
}

#[inline]
fn hann(i: usize, len: usize) -> f32 {
    if len < 2 {
        return 1.0;
    }
    let x = 2.0 * std::f32::consts::PI * i as f32 / (len as f32 - 1.0);
    0.5 - 0.5 * x.cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_filter_identity() {
        let coeff = FirCoeff::from_taps([1.0f32]);
        assert_eq!(10.0f32, coeff.filter(&[3.0, 10.0]));
        assert_eq!(1, coeff.len());
    }

    #[test]
    fn test_filter_reversed_storage() {
        // h[0] applies to the newest sample
        let coeff = FirCoeff::from_taps([1.0f32, 0.0, 0.0]);
        assert_eq!(7.0f32, coeff.filter(&[1.0, 2.0, 7.0]));

        let coeff = FirCoeff::from_taps([0.0f32, 0.0, 1.0]);
        assert_eq!(1.0f32, coeff.filter(&[1.0, 2.0, 7.0]));
    }

    #[test]
    fn test_filter_short_history() {
        // missing history is zero
        let coeff = FirCoeff::from_taps([1.0f32, 1.0, 1.0, 1.0]);
        assert_eq!(3.0f32, coeff.filter(&[1.0, 2.0]));
    }

    #[test]
    fn test_history() {
        let mut hist = History::new(3);
        assert_eq!(&[0.0, 0.0, 0.0], hist.as_slice());
        hist.push(1.0);
        hist.push(2.0);
        assert_eq!(&[0.0, 1.0, 2.0], hist.as_slice());
        hist.push(3.0);
        hist.push(4.0);
        assert_eq!(&[2.0, 3.0, 4.0], hist.as_slice());
        hist.reset();
        assert_eq!(&[0.0, 0.0, 0.0], hist.as_slice());
    }

    #[test]
    fn test_lowpass_dc_gain() {
        let taps = lowpass_taps(31, 0.25, 1.0);
        let sum: f32 = taps.iter().sum();
        assert_approx_eq!(1.0f32, sum, 1.0e-6);

        let taps = lowpass_taps(24, 0.1, 3.0);
        let sum: f32 = taps.iter().sum();
        assert_approx_eq!(3.0f32, sum, 1.0e-5);
    }

    #[test]
    fn test_lowpass_symmetric() {
        let taps = lowpass_taps(21, 0.2, 1.0);
        for i in 0..taps.len() / 2 {
            assert_approx_eq!(taps[i], taps[taps.len() - 1 - i], 1.0e-6);
        }
    }
}
