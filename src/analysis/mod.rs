//! Signal analysis for the microphone monitor
//!
//! `AnalysisContext` buffers the live stream and produces byte views of it;
//! `SignalAnalyzer` turns those views into an `AnalysisFrame` once per tick.

mod context;

pub use context::{
    magnitude_to_byte, sample_to_byte, AnalysisContext, DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING,
};

use serde::Serialize;

/// Display data for one render tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisFrame {
    /// Unsigned 8-bit samples centred on 128, one per window sample
    pub time_domain: Vec<u8>,
    /// Unsigned 8-bit magnitudes, one per frequency bin
    pub frequency_domain: Vec<u8>,
    /// Loudness in [0, 100], derived from `time_domain` alone
    pub loudness_percent: u8,
}

/// Stateless per-tick analyzer
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalAnalyzer;

impl SignalAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Pull pending input into the context and read both views
    pub fn analyze(&self, context: &mut AnalysisContext) -> AnalysisFrame {
        context.pump();

        let frequency_domain = context.byte_frequency_data();
        let time_domain = context.byte_time_domain();
        let loudness_percent = loudness_percent(&time_domain);

        AnalysisFrame {
            time_domain,
            frequency_domain,
            loudness_percent,
        }
    }
}

/// RMS loudness of a byte time-domain buffer
///
/// Samples are normalized with `(s - 128) / 128`; the RMS is scaled by 200,
/// rounded and capped at 100, so an RMS of 0.5 already reads 100%.
pub fn loudness_percent(time_domain: &[u8]) -> u8 {
    if time_domain.is_empty() {
        return 0;
    }

    let sum: f64 = time_domain
        .iter()
        .map(|&s| {
            let normalized = (s as f64 - 128.0) / 128.0;
            normalized * normalized
        })
        .sum();
    let rms = (sum / time_domain.len() as f64).sqrt();

    (rms * 200.0).round().min(100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_zero() {
        assert_eq!(loudness_percent(&[128; 2048]), 0);
    }

    #[test]
    fn test_full_swing_saturates() {
        let swing: Vec<u8> = (0..2048).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
        assert_eq!(loudness_percent(&swing), 100);
    }

    #[test]
    fn test_half_scale_rms_already_reads_full() {
        // |s - 128| = 64 everywhere gives RMS 0.5
        let half: Vec<u8> = (0..1024).map(|i| if i % 2 == 0 { 64 } else { 192 }).collect();
        assert_eq!(loudness_percent(&half), 100);
    }

    #[test]
    fn test_rounding_to_nearest() {
        // RMS 1/128 -> 1.5625 -> 2
        let tiny: Vec<u8> = (0..100).map(|i| if i % 2 == 0 { 127 } else { 129 }).collect();
        assert_eq!(loudness_percent(&tiny), 2);
        // RMS 16/128 -> 25
        assert_eq!(loudness_percent(&[144; 64]), 25);
    }

    #[test]
    fn test_always_within_range() {
        for value in 0..=255u8 {
            let percent = loudness_percent(&[value; 16]);
            assert!(percent <= 100);
        }
        let ramp: Vec<u8> = (0..=255).collect();
        assert!(loudness_percent(&ramp) <= 100);
    }

    #[test]
    fn test_empty_buffer_is_silent() {
        assert_eq!(loudness_percent(&[]), 0);
    }

    #[test]
    fn test_analyze_reports_window_and_bins() {
        let mut ctx = AnalysisContext::new(DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING, 48000);
        ctx.push_samples(&vec![0.125; DEFAULT_FFT_SIZE]);

        let frame = SignalAnalyzer::new().analyze(&mut ctx);
        assert_eq!(frame.time_domain.len(), 2048);
        assert_eq!(frame.frequency_domain.len(), 1024);
        // 0.125 -> byte 144 -> 25%
        assert_eq!(frame.loudness_percent, 25);
    }
}
