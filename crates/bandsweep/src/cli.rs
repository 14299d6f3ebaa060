use std::fmt::Display;

use bandscan::{Modulation, WindowKind};
use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};

/// Standard input filename
const STDIN_FILE: &str = "-";

const USAGE_SHORT: &str = r#"
This program accepts raw IQ samples at the given sampling --rate and either reports the signals present in the spectrum or demodulates them to baseband audio.

See --help for more details.
"#;

const USAGE_LONG: &str = r#"
This program accepts raw IQ samples at the given sampling --rate and either reports the signals present in the spectrum (the default) or, with --demod, converts them to baseband audio on standard output.

You can pipe in samples from rtl_sdr:

    rtl_sdr -f 100300000 -s 2400000 - \
        | bandsweep -r 2400000 -f 100300000

Demodulate broadcast FM to 48 kHz f32 audio and play it:

    rtl_sdr -f 100300000 -s 240000 - \
        | bandsweep -r 240000 -f 100300000 --demod fm \
        | play -t raw -r 48k -e floating-point -b 32 -c 1 -

Arguments which follow "--" spawn a child process. Demodulated audio is piped to the child's standard input, which is how external protocol decoders such as multimon-ng consume this program's output:

    rtl_sdr -f 153250000 -s 240000 - \
        | bandsweep -r 240000 --demod fm --pcm16 -o 22050 \
            -- multimon-ng -t raw -a POCSAG1200 -

The child process receives environment variables describing the stream:

  BANDSWEEP_RATE="48000" (audio output rate)
  BANDSWEEP_MODULATION="fm"
  BANDSWEEP_FREQUENCY="100300000" (tuned center frequency, Hz)
  BANDSWEEP_FORMAT="f32" (or "s16" with --pcm16)

Child processes MUST read or close standard input.
Child processes MUST exit when their standard input is closed.
"#;

const ADVANCED: &str = "Advanced DSP Options";

/// IQ input sample format
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SampleFormat {
    /// Unsigned 8-bit offset binary, as produced by rtl_sdr
    U8,
    /// Little-endian 32-bit float pairs
    F32,
}

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_help = USAGE_SHORT, after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print NOTHING, not even detected signals
    #[arg(short, long)]
    pub quiet: bool,

    /// IQ sampling rate (Hz)
    ///
    /// Set to the rate of your IQ source, e.g. the -s argument
    /// passed to rtl_sdr.
    #[arg(short, long, default_value_t = 2_400_000)]
    pub rate: u32,

    /// Input file (or "-" for stdin)
    #[arg(long, default_value_t = STDIN_FILE.to_string())]
    pub file: String,

    /// IQ sample format
    #[arg(long, value_enum, default_value_t = SampleFormat::U8)]
    pub format: SampleFormat,

    /// Tuned center frequency (Hz), for frequency labeling
    #[arg(short = 'f', long, default_value_t = 100_000_000)]
    pub center_freq: u64,

    /// Demodulate to baseband instead of analyzing the spectrum
    #[arg(short, long)]
    pub demod: Option<Modulation>,

    /// Audio output rate (Hz)
    #[arg(short, long, default_value_t = 48_000)]
    pub output_rate: u32,

    /// Write audio as signed 16-bit PCM instead of f32
    #[arg(long)]
    pub pcm16: bool,

    /// Spectrum FFT size
    #[arg(long, default_value_t = 2048)]
    pub fft_size: usize,

    /// Analysis window
    #[arg(long, default_value_t = WindowKind::Hann)]
    pub window: WindowKind,

    /// Spectra averaged before signal detection
    #[arg(long, default_value_t = 32)]
    pub frames: u32,

    /// Detection threshold over the noise floor (dB)
    #[arg(long, default_value_t = 10.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub threshold_db: f32,

    /// Peak merge tolerance (kHz)
    #[arg(long, default_value_t = 10.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub merge_khz: f32,

    /// Noise floor percentile (0-100)
    #[arg(long, default_value_t = 10.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub noise_percentile: f32,

    /// AGC update rate (0.0-1.0)
    #[arg(long, default_value_t = 0.01)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub agc_rate: f32,

    /// FM peak deviation (Hz)
    #[arg(long, default_value_t = 75_000.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub deviation: f32,

    /// FM de-emphasis time constant (µs)
    #[arg(long, default_value_t = 75.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub deemphasis_us: f32,

    /// GMSK symbol rate (Hz)
    #[arg(long, default_value_t = 9_600)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub symbol_rate: u32,

    /// Spawn child process to consume demodulated audio. Optional.
    ///
    /// Arguments are provided VERBATIM to the child process
    /// without shell interpretation.
    #[arg(last = true)]
    pub child: Vec<String>,
}

impl Args {
    /// Return true if the user requests input from stdin
    pub fn input_is_stdin(&self) -> bool {
        self.file == STDIN_FILE
    }
}

/// A program-level error with exit code
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Create new error with a custom exit code
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Print this error to the terminal
    ///
    /// Errors from clap are printed verbatim. Other types of errors
    /// are printed indirectly via clap's fancy formatter.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Print this error to the terminal and exit
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        let code = if err.use_stderr() { 1 } else { 0 };
        CliError::new(err.into(), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clap() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_demod() {
        let args = Args::try_parse_from(["bandsweep", "--demod", "fm", "-r", "240000"]).unwrap();
        assert_eq!(Some(Modulation::Fm), args.demod);
        assert_eq!(240_000, args.rate);
        assert!(args.input_is_stdin());

        let args = Args::try_parse_from(["bandsweep", "--", "multimon-ng", "-a", "POCSAG1200"])
            .unwrap();
        assert_eq!(None, args.demod);
        assert_eq!(
            vec!["multimon-ng", "-a", "POCSAG1200"],
            args.child.iter().map(String::as_str).collect::<Vec<_>>()
        );
    }
}
