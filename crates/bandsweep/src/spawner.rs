//! Spawns child decoder processes
//!
//! External protocol decoders (multimon-ng, rtl_433 in stream mode,
//! and friends) consume this program's demodulated output on their
//! standard input. The child learns the stream parameters from its
//! environment.
//!
//! Decoders that want the tuner itself instead of a sample stream
//! must be run while this program is NOT holding the device: release
//! the handle before handing off, reacquire after.

use std::ffi::OsStr;
use std::io;
use std::process::{Child, Command, Stdio};

use bandscan::Modulation;

/// Spawn a child process to consume the demodulated stream
///
/// Starts the executable `cmd` with the given `args`, its stdin
/// piped. The stream parameters are passed as environment variables;
/// higher-level logic pipes the audio itself to the child's stdin.
pub fn spawn<C, A, B>(
    cmd: C,
    args: A,
    modulation: Modulation,
    center_freq: u64,
    output_rate: u32,
    pcm16: bool,
) -> io::Result<Child>
where
    C: AsRef<OsStr>,
    B: AsRef<OsStr>,
    A: IntoIterator<Item = B>,
{
    Command::new(cmd)
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .args(args)
        .env(childenv::BANDSWEEP_RATE, output_rate.to_string())
        .env(childenv::BANDSWEEP_MODULATION, modulation.to_string())
        .env(childenv::BANDSWEEP_FREQUENCY, center_freq.to_string())
        .env(childenv::BANDSWEEP_FORMAT, format_str(pcm16))
        .spawn()
}

mod childenv {
    /// Audio output rate
    ///
    /// The rate, in Hz, at which samples are piped to the child's
    /// standard input.
    pub const BANDSWEEP_RATE: &str = "BANDSWEEP_RATE";

    /// Modulation being demodulated (`fm`, `am`, or `gmsk`)
    pub const BANDSWEEP_MODULATION: &str = "BANDSWEEP_MODULATION";

    /// Tuned center frequency, in Hz
    pub const BANDSWEEP_FREQUENCY: &str = "BANDSWEEP_FREQUENCY";

    /// Sample format on the pipe
    ///
    /// `f32` for little-endian 32-bit floats, `s16` for signed
    /// 16-bit PCM (`--pcm16`).
    pub const BANDSWEEP_FORMAT: &str = "BANDSWEEP_FORMAT";
}

// convert the --pcm16 flag to the advertised format string
fn format_str(pcm16: bool) -> &'static str {
    if pcm16 {
        "s16"
    } else {
        "f32"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_str() {
        assert_eq!("f32", format_str(false));
        assert_eq!("s16", format_str(true));
    }
}
