//! Analysis and demodulation run loops
//!
//! Two modes, selected by `--demod`:
//!
//! 1. Spectrum analysis (default): frame the input into FFT blocks,
//!    average, detect, and print a report.
//!
//! 2. Demodulation: run the AGC → demodulator → resampler pipeline
//!    and stream baseband samples to stdout or to a child decoder
//!    process.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Context};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info, warn};

use bandscan::{
    AudioSink, Modulation, PipelineBuilder, SampleBlock, SignalDetector, SpectralAverage,
    SpectrumAnalyzer,
};

use crate::cli::{Args, SampleFormat};
use crate::spawner;

/// Run the application
pub fn run(args: &Args, input: &mut dyn BufRead) -> Result<(), anyhow::Error> {
    if let Some(gap) = bandscan::tuner_gap(args.center_freq) {
        warn!(
            "{} Hz falls in the {}; captures from an affected tuner may be empty",
            args.center_freq, gap.label
        );
    }

    match args.demod {
        Some(modulation) => demodulate(args, modulation, input),
        None => analyze(args, input),
    }
}

// read one block of `count` complex samples; None on clean EOF
fn read_block(
    args: &Args,
    input: &mut dyn BufRead,
    count: usize,
) -> io::Result<Option<SampleBlock>> {
    let mut iq = vec![0.0f32; count * 2];
    let result = match args.format {
        SampleFormat::U8 => {
            let mut bytes = vec![0u8; count * 2];
            input.read_exact(&mut bytes).map(|()| {
                for (out, &byte) in iq.iter_mut().zip(bytes.iter()) {
                    // rtl_sdr offset binary: 0..=255 → -1.0..=1.0
                    *out = (byte as f32 - 127.5) / 127.5;
                }
            })
        }
        SampleFormat::F32 => input.read_f32_into::<LittleEndian>(&mut iq),
    };

    match result {
        Ok(()) => Ok(Some(SampleBlock::from_interleaved(
            &iq,
            args.rate,
            args.center_freq,
        ))),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err),
    }
}

fn analyze(args: &Args, input: &mut dyn BufRead) -> Result<(), anyhow::Error> {
    let analyzer = SpectrumAnalyzer::new(args.fft_size, args.window);
    let detector = SignalDetector::new(args.threshold_db, args.merge_khz as f64 * 1.0e3);
    let mut average = SpectralAverage::new();

    while average.count() < args.frames {
        let block = match read_block(args, input, args.fft_size)? {
            Some(block) => block,
            None => break,
        };
        let spectrum = analyzer
            .process(&block)
            .context("spectrum analysis failed")?;
        average.update(&spectrum);
    }

    let spectrum = average
        .averaged()
        .ok_or_else(|| anyhow!("input ended before one full FFT frame was read"))?;
    debug!("averaged {} spectra", average.count());

    let floor = average
        .noise_floor(args.noise_percentile)
        .expect("noise floor follows from a non-empty average");
    let signals = detector.detect(&spectrum, floor);

    if args.quiet {
        return Ok(());
    }

    let (_, peak_db) = spectrum.peak().expect("spectrum is never empty");
    println!(
        "Spectrum analysis at {:.3} MHz ({} x {}-point {}, {} frames)",
        args.center_freq as f64 / 1.0e6,
        args.rate,
        args.fft_size,
        args.window,
        average.count(),
    );
    println!("Peak power:    {:6.1} dB", peak_db);
    println!("Noise floor:   {:6.1} dB", floor);
    println!("Dynamic range: {:6.1} dB", peak_db - floor);

    if signals.is_empty() {
        println!("No signals detected above threshold");
    } else {
        println!("Detected {} signal(s):", signals.len());
        for sig in &signals {
            print!(
                "  {:10.4} MHz: {:6.1} dB, BW {:7.1} kHz, SNR {:5.1} dB [{}]",
                sig.frequency / 1.0e6,
                sig.power,
                sig.bandwidth / 1.0e3,
                sig.snr,
                sig.class,
            );
            match sig.band {
                Some(band) => println!(" ({})", band),
                None => println!(),
            }
        }
    }

    Ok(())
}

fn demodulate(
    args: &Args,
    modulation: Modulation,
    input: &mut dyn BufRead,
) -> Result<(), anyhow::Error> {
    let mut pipeline = PipelineBuilder::new(args.rate)
        .with_modulation(modulation)
        .with_output_rate(args.output_rate)
        .with_agc_rate(args.agc_rate)
        .with_deviation(args.deviation)
        .with_deemphasis(args.deemphasis_us * 1.0e-6)
        .with_symbol_rate(args.symbol_rate)
        .build();
    info!(
        "demodulating {} at {} Hz IQ → {} Hz out",
        modulation,
        args.rate,
        pipeline.output_rate()
    );

    // a child decoder consumes the audio; otherwise stdout does
    let mut child = if args.child.is_empty() {
        None
    } else {
        let child = spawner::spawn(
            &args.child[0],
            &args.child[1..],
            modulation,
            args.center_freq,
            pipeline.output_rate(),
            args.pcm16,
        )
        .context("unable to spawn child process")?;
        debug!("spawned child process PID {}", child.id());
        Some(child)
    };

    let stdout = io::stdout();
    let mut sink: StreamSink<Box<dyn Write>> = match &mut child {
        Some(child) => StreamSink::new(
            Box::new(child.stdin.take().ok_or_else(|| {
                anyhow!("unable to open pipe to child process")
            })?),
            args.pcm16,
        ),
        None => StreamSink::new(Box::new(stdout.lock()), args.pcm16),
    };

    // 100 ms chunks
    let chunk = (args.rate / 10).max(1) as usize;
    while let Some(block) = read_block(args, input, chunk)? {
        let audio = pipeline.process(&block);
        sink.write(&audio).context("unable to write audio")?;
    }
    sink.flush().context("unable to flush audio")?;
    drop(sink);

    info!(
        "input exhausted after {} blocks; final gain {:.1}",
        pipeline.blocks_in(),
        pipeline.gain()
    );

    // the sink is closed; the child must now exit on its own
    if let Some(mut child) = child.take() {
        match child.wait() {
            Ok(exit) if exit.success() => debug!("child process exited successfully"),
            Ok(exit) => warn!(
                "child process exited abnormally with status {}",
                exit.code().unwrap_or(1)
            ),
            Err(err) => warn!("unable to await child process exit: {}", err),
        }
    }

    Ok(())
}

// writes f32 or i16 little-endian frames to a byte stream
struct StreamSink<W: Write> {
    out: W,
    pcm16: bool,
}

impl<W: Write> StreamSink<W> {
    fn new(out: W, pcm16: bool) -> Self {
        Self { out, pcm16 }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl<W: Write> AudioSink for StreamSink<W> {
    fn write(&mut self, samples: &[f32]) -> io::Result<()> {
        for &sample in samples {
            if self.pcm16 {
                let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                self.out.write_i16::<LittleEndian>(pcm)?;
            } else {
                self.out.write_f32::<LittleEndian>(sample)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::Parser;

    fn test_args(extra: &[&str]) -> Args {
        let mut argv = vec!["bandsweep", "--rate", "1024000", "--format", "f32"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    // interleaved little-endian f32 IQ bytes for a centered tone
    fn tone_bytes(len: usize, fs: u32, offset_hz: f64) -> Vec<u8> {
        const TWO_PI: f64 = 2.0 * std::f64::consts::PI;
        let step = TWO_PI * offset_hz / fs as f64;
        let mut bytes = Vec::with_capacity(len * 8);
        for n in 0..len {
            let phase = (step * n as f64) % TWO_PI;
            bytes.extend_from_slice(&(phase.cos() as f32).to_le_bytes());
            bytes.extend_from_slice(&(phase.sin() as f32).to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_read_block_f32_and_eof() {
        let args = test_args(&[]);
        let bytes = tone_bytes(3000, 1_024_000, 0.0);
        let mut reader = io::BufReader::new(&bytes[..]);

        let block = read_block(&args, &mut reader, 2048).unwrap().unwrap();
        assert_eq!(2048, block.len());
        assert_eq!(1_024_000, block.sample_rate());

        // only 952 samples remain: clean EOF, not an error
        assert!(read_block(&args, &mut reader, 2048).unwrap().is_none());
    }

    #[test]
    fn test_read_block_u8_offset_binary() {
        let args = test_args(&["--format", "u8"]);
        let bytes = [0u8, 255, 128, 128];
        let mut reader = io::BufReader::new(&bytes[..]);

        let block = read_block(&args, &mut reader, 2).unwrap().unwrap();
        assert!((block.samples()[0].re + 1.0).abs() < 1.0e-6);
        assert!((block.samples()[0].im - 1.0).abs() < 1.0e-6);
        assert!(block.samples()[1].re.abs() < 5.0e-3);
    }

    #[test]
    fn test_analyze_finds_tone() {
        let args = test_args(&[
            "--center-freq",
            "100000000",
            "--fft-size",
            "1024",
            "--frames",
            "4",
            "--threshold-db",
            "30",
        ]);
        let bytes = tone_bytes(4096, 1_024_000, 100_000.0);
        let mut reader = io::BufReader::new(&bytes[..]);
        analyze(&args, &mut reader).unwrap();
    }

    #[test]
    fn test_analyze_empty_input_fails() {
        let args = test_args(&[]);
        let mut reader = io::BufReader::new(&[][..]);
        assert!(analyze(&args, &mut reader).is_err());
    }

    #[test]
    fn test_stream_sink_pcm16() {
        let mut buf = Vec::new();
        let mut sink = StreamSink::new(&mut buf, true);
        sink.write(&[0.0, 1.0, -1.0, 2.0]).unwrap();
        assert_eq!(8, buf.len());
        assert_eq!(0i16, i16::from_le_bytes([buf[0], buf[1]]));
        assert_eq!(i16::MAX, i16::from_le_bytes([buf[2], buf[3]]));
        // over-range input clamps instead of wrapping
        assert_eq!(i16::MAX, i16::from_le_bytes([buf[6], buf[7]]));
    }
}
