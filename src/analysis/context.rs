use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, trace};

use crate::audio::AudioFrame;

/// Transform size used by capture sessions
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Exponential decay applied to frequency magnitudes between reads
pub const DEFAULT_SMOOTHING: f32 = 0.8;

/// Decibel range mapped onto 0..=255 by the byte frequency view
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Smallest transform the context accepts
const MIN_FFT_SIZE: usize = 32;

/// Time/frequency analysis primitive fed by one input stream
///
/// Keeps the most recent `fft_size` samples. The time-domain view is a plain
/// copy of that window; the frequency view is a Blackman-windowed transform
/// whose magnitudes are smoothed across reads.
pub struct AnalysisContext {
    fft_size: usize,
    smoothing: f32,
    sample_rate: u32,
    ring: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    input: Option<mpsc::Receiver<AudioFrame>>,
    closed: bool,
}

impl AnalysisContext {
    /// `fft_size` is rounded up to a power of two; `smoothing` is clamped to [0, 1]
    pub fn new(fft_size: usize, smoothing: f32, sample_rate: u32) -> Self {
        let fft_size = fft_size.max(MIN_FFT_SIZE).next_power_of_two();
        let smoothing = if smoothing.is_finite() {
            smoothing.clamp(0.0, 1.0)
        } else {
            DEFAULT_SMOOTHING
        };

        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        debug!(
            "Analysis context: fft_size={}, smoothing={}, sample_rate={}Hz",
            fft_size, smoothing, sample_rate
        );

        Self {
            fft_size,
            smoothing,
            sample_rate,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            window: blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            input: None,
            closed: false,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Bind a stream's frame receiver as this context's input
    pub fn connect(&mut self, input: mpsc::Receiver<AudioFrame>) {
        self.input = Some(input);
    }

    /// Move every pending input frame into the sample window
    ///
    /// Returns the number of samples consumed.
    pub fn pump(&mut self) -> usize {
        let mut consumed = 0;
        let mut pending = Vec::new();

        if let Some(input) = self.input.as_mut() {
            loop {
                match input.try_recv() {
                    Ok(frame) => pending.push(frame),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        trace!("Analysis input disconnected");
                        self.input = None;
                        break;
                    }
                }
            }
        }

        for frame in pending {
            consumed += frame.samples.len();
            self.push_samples(&frame.samples);
        }

        consumed
    }

    /// Append samples to the window, discarding the oldest
    pub fn push_samples(&mut self, samples: &[f32]) {
        if self.closed {
            return;
        }

        // Only the tail can survive in the window
        let start = samples.len().saturating_sub(self.fft_size);
        for &sample in &samples[start..] {
            self.ring[self.write_pos] = if sample.is_finite() { sample } else { 0.0 };
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Current window, oldest sample first
    pub fn float_time_domain(&self) -> Vec<f32> {
        (0..self.fft_size)
            .map(|i| self.ring[(self.write_pos + i) % self.fft_size])
            .collect()
    }

    /// Time-domain view as unsigned bytes centred on 128, `fft_size` long
    pub fn byte_time_domain(&self) -> Vec<u8> {
        self.float_time_domain()
            .into_iter()
            .map(sample_to_byte)
            .collect()
    }

    /// Smoothed magnitude per bin, `frequency_bin_count` long
    ///
    /// Each call advances the smoothing by one step.
    pub fn float_frequency_magnitudes(&mut self) -> Vec<f32> {
        if self.closed {
            return vec![0.0; self.frequency_bin_count()];
        }

        let samples = self.float_time_domain();
        for (slot, (sample, weight)) in self
            .buffer
            .iter_mut()
            .zip(samples.iter().zip(self.window.iter()))
        {
            *slot = Complex::new(sample * weight, 0.0);
        }

        self.fft.process(&mut self.buffer);

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(self.buffer.iter()) {
            let magnitude = bin.norm() * scale;
            let next = tau * *smoothed + (1.0 - tau) * magnitude;
            *smoothed = if next.is_finite() { next } else { 0.0 };
        }

        self.smoothed.clone()
    }

    /// Frequency view as bytes, dB range [-100, -30] mapped onto 0..=255
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        self.float_frequency_magnitudes()
            .into_iter()
            .map(magnitude_to_byte)
            .collect()
    }

    /// Disconnect the input and zero every buffer; the context cannot be reused
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.input = None;
        self.ring.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        self.write_pos = 0;
        self.closed = true;
        debug!("Analysis context closed");
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = i as f32 / n;
            A0 - A1 * (2.0 * std::f32::consts::PI * x).cos()
                + A2 * (4.0 * std::f32::consts::PI * x).cos()
        })
        .collect()
}

/// Map a sample in [-1, 1] onto 0..=255 with silence at 128
pub fn sample_to_byte(sample: f32) -> u8 {
    (128.0 * (sample + 1.0)).clamp(0.0, 255.0) as u8
}

/// Map a linear magnitude onto 0..=255 through the decibel window
pub fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (255.0 / (MAX_DECIBELS - MIN_DECIBELS)) * (db - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}
