//! Spectrum analyser — PCM to the byte magnitude buffer lip sync consumes.
//!
//! Mirrors what a browser analyser node reports from `getByteFrequencyData`
//! (Blackman window, smoothed magnitudes, dB mapped onto 0–255) so a headless
//! host playing raw audio produces the same buffers a web client would.

use crate::rig::RigError;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct SpectrumAnalyser {
    fft_size: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    window: Vec<f32>,
    fft: Arc<dyn rustfft::Fft<f32>>,
    smoothed: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl std::fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_db", &self.min_db)
            .field("max_db", &self.max_db)
            .finish()
    }
}

impl SpectrumAnalyser {
    /// `fft_size` is rounded up to a power of two, minimum 32.
    pub fn new(fft_size: usize) -> Self {
        let n = fft_size.max(32).next_power_of_two();
        let window = (0..n)
            .map(|i| {
                let x = 2.0 * PI * i as f32 / n as f32;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();
        let fft = FftPlanner::new().plan_fft_forward(n);
        Self {
            fft_size: n,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
            window,
            fft,
            smoothed: vec![0.0; n / 2],
            buffer: vec![Complex::new(0.0, 0.0); n],
        }
    }

    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(0.0, 0.99);
        self
    }

    pub fn with_db_range(mut self, min_db: f32, max_db: f32) -> Self {
        if max_db > min_db {
            self.min_db = min_db;
            self.max_db = max_db;
        }
        self
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Analyse the most recent `fft_size` samples (zero-padded at the front
    /// when fewer are given). Non-finite samples count as silence.
    pub fn process(&mut self, samples: &[f32]) -> Vec<u8> {
        let n = self.fft_size;
        let tail = &samples[samples.len().saturating_sub(n)..];
        let pad = n - tail.len();
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let s = if i < pad { 0.0 } else { tail[i - pad] };
            let s = if s.is_finite() { s } else { 0.0 };
            *slot = Complex::new(s * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let range = self.max_db - self.min_db;
        let mut out = Vec::with_capacity(n / 2);
        for k in 0..n / 2 {
            let magnitude = self.buffer[k].norm() / n as f32;
            let s = self.smoothing * self.smoothed[k] + (1.0 - self.smoothing) * magnitude;
            self.smoothed[k] = s;

            let db = if s > 0.0 { 20.0 * s.log10() } else { f32::NEG_INFINITY };
            let scaled = 255.0 * (db - self.min_db) / range;
            out.push(scaled.clamp(0.0, 255.0) as u8);
        }
        out
    }

    /// Forget smoothing history (new utterance).
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }
}

/// Read a WAV file as mono f32 samples in [-1, 1], averaging channels.
pub fn load_wav_mono(path: &Path) -> Result<(Vec<f32>, u32), RigError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1) as u32)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / rate).sin() * 0.8)
            .collect()
    }

    #[test]
    fn size_rounds_to_power_of_two() {
        let a = SpectrumAnalyser::new(200);
        assert_eq!(a.fft_size(), 256);
        assert_eq!(a.bin_count(), 128);
        assert_eq!(SpectrumAnalyser::new(1).fft_size(), 32);
    }

    #[test]
    fn silence_reads_as_zero() {
        let mut a = SpectrumAnalyser::new(256);
        let bins = a.process(&vec![0.0; 256]);
        assert_eq!(bins.len(), 128);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let rate = 48_000.0;
        let mut a = SpectrumAnalyser::new(256)
            .with_smoothing(0.0)
            .with_db_range(-100.0, 0.0);
        // 187.5 Hz per bin; bin 20 = 3750 Hz.
        let bins = a.process(&sine(3750.0, rate, 256));
        let (argmax, _) = bins
            .iter()
            .enumerate()
            .max_by_key(|(_, &b)| b)
            .unwrap();
        assert!((19..=21).contains(&argmax), "peak at bin {}", argmax);
        assert!(bins[argmax] > 150, "peak too weak: {}", bins[argmax]);
    }

    #[test]
    fn tone_peak_follows_frequency() {
        let rate = 16_000.0;
        // 512-point FFT at 16 kHz → 31.25 Hz per bin.
        for bin in [8usize, 32, 100, 200] {
            let mut a = SpectrumAnalyser::new(512)
                .with_smoothing(0.0)
                .with_db_range(-100.0, 0.0);
            let bins = a.process(&sine(bin as f32 * 31.25, rate, 512));
            assert_eq!(bins.len(), 256);
            let argmax = (0..bins.len()).max_by_key(|&i| bins[i]).unwrap();
            assert_eq!(argmax, bin, "tone for bin {} peaked at {}", bin, argmax);
            assert!(bins[bin] > bins[bin + 4], "energy leaked to bin {}", bin + 4);
        }
    }

    #[test]
    fn smoothing_carries_energy_into_silence() {
        let mut a = SpectrumAnalyser::new(256);
        let tone = sine(1000.0, 48_000.0, 256);
        for _ in 0..10 {
            a.process(&tone);
        }
        let after = a.process(&vec![0.0; 256]);
        assert!(after.iter().any(|&b| b > 0), "smoothed tail should linger");
        a.reset();
        let cleared = a.process(&vec![0.0; 256]);
        assert!(cleared.iter().all(|&b| b == 0));
    }

    #[test]
    fn nan_samples_are_silence() {
        let mut a = SpectrumAnalyser::new(64);
        let bins = a.process(&vec![f32::NAN; 64]);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn wav_round_trip_mono() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            w.write_sample(16_384i16).unwrap();
            w.write_sample(0i16).unwrap();
        }
        w.finalize().unwrap();

        let (mono, rate) = load_wav_mono(&path).unwrap();
        assert_eq!(rate, 16_000);
        assert_eq!(mono.len(), 100);
        assert!((mono[0] - 0.25).abs() < 1e-3, "got {}", mono[0]);
    }

    #[test]
    fn missing_wav_is_an_error() {
        let err = load_wav_mono(Path::new("/definitely/not/here.wav"));
        assert!(err.is_err());
    }
}
