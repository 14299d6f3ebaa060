//! Error taxonomy
//!
//! Structural errors are raised to the session owner. Per-block
//! numerical hazards (zero-amplitude AGC input, log of zero power)
//! are corrected in place inside the DSP stages and never raised.
//! Buffer overruns are counted, not raised; see
//! [`CaptureHandle::overruns`](crate::capture::CaptureHandle::overruns).

use thiserror::Error;

use crate::source::HardwareError;

/// Structural pipeline error
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// A block or spectrum violated a length invariant.
    ///
    /// Always a caller bug; the offending input is never truncated
    /// or zero-padded to fit.
    #[error("input of {actual} samples does not match the configured size {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Device-level failure, propagated from the hardware layer
    #[error(transparent)]
    Hardware(#[from] HardwareError),
}
