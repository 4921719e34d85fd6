use std::{f32::consts::PI, fmt, ops::Range, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{config::AudioConfig, smoothing::MovingAverage, MotionError, Result};

/// Three-band energy summary of a spectrum snapshot, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioBands {
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
}

impl AudioBands {
    pub fn new(bass: f32, mid: f32, high: f32) -> Self {
        Self { bass, mid, high }
    }

    /// Replaces non-finite values with zero and clamps into `[0, 1]`.
    pub fn sanitized(self) -> Self {
        Self {
            bass: unit(self.bass),
            mid: unit(self.mid),
            high: unit(self.high),
        }
    }
}

pub(crate) fn unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Maps a frequency to the nearest analyser bin.
pub fn bin_index(frequency_hz: f32, fft_size: usize, sample_rate: u32) -> usize {
    if sample_rate == 0 || !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return 0;
    }
    (frequency_hz * fft_size as f32 / sample_rate as f32).round() as usize
}

/// Bin ranges backing each band, computed once from the configured edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandRanges {
    pub bass: Range<usize>,
    pub mid: Range<usize>,
    pub high: Range<usize>,
}

impl BandRanges {
    pub fn from_config(config: &AudioConfig) -> Self {
        let bin_count = config.fft_size / 2;
        let range = |(low, high): (f32, f32)| {
            let start = bin_index(low, config.fft_size, config.sample_rate).min(bin_count);
            let end = bin_index(high, config.fft_size, config.sample_rate).min(bin_count);
            // Narrow bands at coarse resolutions still get one bin.
            let end = end.max((start + 1).min(bin_count));
            start..end
        };

        Self {
            bass: range(config.bass_range_hz),
            mid: range(config.mid_range_hz),
            high: range(config.high_range_hz),
        }
    }
}

/// Reduces byte-valued frequency bins to three smoothed band energies.
#[derive(Debug, Clone)]
pub struct FrequencyBandAnalyzer {
    ranges: BandRanges,
    bass: MovingAverage,
    mid: MovingAverage,
    high: MovingAverage,
    latest: AudioBands,
}

impl FrequencyBandAnalyzer {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        if config.sample_rate == 0 {
            return Err(MotionError::InvalidInput("sample rate must be positive"));
        }
        if config.fft_size < 2 {
            return Err(MotionError::InvalidInput(
                "fft size must cover at least two samples",
            ));
        }

        Ok(Self {
            ranges: BandRanges::from_config(config),
            bass: MovingAverage::new(config.band_window),
            mid: MovingAverage::new(config.band_window),
            high: MovingAverage::new(config.band_window),
            latest: AudioBands::default(),
        })
    }

    pub fn ranges(&self) -> &BandRanges {
        &self.ranges
    }

    pub fn latest(&self) -> AudioBands {
        self.latest
    }

    /// Folds one spectrum snapshot into the band averages. Bins missing from
    /// a short snapshot are ignored; a band with no bins reads as silence.
    pub fn analyze(&mut self, bins: &[u8]) -> AudioBands {
        let bass = band_mean(bins, &self.ranges.bass);
        let mid = band_mean(bins, &self.ranges.mid);
        let high = band_mean(bins, &self.ranges.high);

        self.latest = AudioBands {
            bass: self.bass.add(bass),
            mid: self.mid.add(mid),
            high: self.high.add(high),
        }
        .sanitized();
        self.latest
    }

    pub fn reset(&mut self) {
        self.bass.reset();
        self.mid.reset();
        self.high.reset();
        self.latest = AudioBands::default();
    }
}

fn band_mean(bins: &[u8], range: &Range<usize>) -> f32 {
    let end = range.end.min(bins.len());
    let start = range.start.min(end);
    let slice = &bins[start..end];
    if slice.is_empty() {
        return 0.0;
    }
    let sum: u32 = slice.iter().map(|&b| b as u32).sum();
    sum as f32 / slice.len() as f32 / 255.0
}

/// Converts PCM blocks into byte magnitudes per frequency bin: Blackman
/// window, real FFT, temporal smoothing, then decibels mapped linearly from
/// `[min_decibels, max_decibels]` onto `0..=255`.
pub struct SpectrumAnalyser {
    fft_size: usize,
    min_decibels: f32,
    max_decibels: f32,
    smoothing: f32,
    history: Vec<f32>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
    fft: FftResources,
}

impl SpectrumAnalyser {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let size = config.fft_size;
        if size < 2 || size % 2 != 0 {
            return Err(MotionError::InvalidInput(
                "fft size must be an even number of at least two samples",
            ));
        }
        if config.max_decibels <= config.min_decibels {
            return Err(MotionError::InvalidInput(
                "max decibels must exceed min decibels",
            ));
        }

        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        let fft = FftResources {
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        };

        Ok(Self {
            fft_size: size,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            smoothing: config.smoothing_time_constant.clamp(0.0, 1.0),
            history: vec![0.0; size],
            window: (0..size).map(|i| blackman_value(i, size)).collect(),
            smoothed: vec![0.0; size / 2],
            bytes: vec![0; size / 2],
            fft,
        })
    }

    /// Number of bins reported by [`SpectrumAnalyser::process`].
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Most recent byte spectrum.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Appends samples to the analysis window and recomputes the spectrum
    /// over the most recent `fft_size` samples.
    pub fn process(&mut self, samples: &[f32]) -> Result<&[u8]> {
        if samples.is_empty() {
            return Err(MotionError::InvalidInput(
                "spectrum analysis requires at least one sample",
            ));
        }

        let size = self.fft_size;
        let incoming = &samples[samples.len().saturating_sub(size)..];
        self.history.rotate_left(incoming.len());
        self.history[size - incoming.len()..].copy_from_slice(incoming);

        for (index, sample) in self.history.iter().enumerate() {
            let sample = if sample.is_finite() { *sample } else { 0.0 };
            self.fft.input[index] = sample * self.window[index];
        }

        self.fft.plan.process_with_scratch(
            &mut self.fft.input,
            &mut self.fft.spectrum,
            &mut self.fft.scratch,
        )?;

        let range = self.max_decibels - self.min_decibels;
        for (bin, value) in self.fft.spectrum.iter().take(size / 2).enumerate() {
            let magnitude = value.norm() / size as f32;
            let smoothed = self.smoothing * self.smoothed[bin] + (1.0 - self.smoothing) * magnitude;
            self.smoothed[bin] = smoothed;

            let db = if smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 * (db - self.min_decibels) / range;
            self.bytes[bin] = if scaled.is_finite() {
                scaled.clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }

        Ok(self.bytes.as_slice())
    }

    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|v| *v = 0.0);
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
        self.bytes.iter_mut().for_each(|v| *v = 0);
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .field("smoothing", &self.smoothing)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    let x = index as f32 / len as f32;
    0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AudioConfig {
        AudioConfig::default()
    }

    #[test]
    fn computes_bin_ranges_from_band_edges() {
        let ranges = BandRanges::from_config(&config());
        assert_eq!(ranges.bass, 1..11);
        assert_eq!(ranges.mid, 11..171);
        assert_eq!(ranges.high, 171..853);
    }

    #[test]
    fn full_scale_bins_converge_to_one() {
        let mut analyzer = FrequencyBandAnalyzer::new(&config()).unwrap();
        let bins = vec![255u8; 1024];
        let mut bands = AudioBands::default();
        for _ in 0..12 {
            bands = analyzer.analyze(&bins);
        }
        assert_eq!(bands, AudioBands::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn isolates_bass_energy() {
        let mut analyzer = FrequencyBandAnalyzer::new(&config()).unwrap();
        let mut bins = vec![0u8; 1024];
        bins[1..11].iter_mut().for_each(|b| *b = 255);

        let bands = analyzer.analyze(&bins);
        assert_eq!(bands.bass, 1.0);
        assert_eq!(bands.mid, 0.0);
        assert_eq!(bands.high, 0.0);
    }

    #[test]
    fn empty_snapshot_reads_as_silence() {
        let mut analyzer = FrequencyBandAnalyzer::new(&config()).unwrap();
        assert_eq!(analyzer.analyze(&[]), AudioBands::default());
    }

    #[test]
    fn moving_average_lags_a_step_change() {
        let mut analyzer = FrequencyBandAnalyzer::new(&config()).unwrap();
        analyzer.analyze(&vec![0u8; 1024]);
        let bands = analyzer.analyze(&vec![255u8; 1024]);
        assert!((bands.bass - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let bad = AudioConfig {
            sample_rate: 0,
            ..config()
        };
        assert!(FrequencyBandAnalyzer::new(&bad).is_err());
    }

    #[test]
    fn spectrum_peaks_near_tone_frequency() {
        let config = AudioConfig {
            smoothing_time_constant: 0.0,
            ..config()
        };
        let mut analyser = SpectrumAnalyser::new(&config).unwrap();
        let tone_hz = 1_000.0;
        let samples: Vec<f32> = (0..config.fft_size)
            .map(|i| 0.001 * (2.0 * PI * tone_hz * i as f32 / config.sample_rate as f32).sin())
            .collect();

        let bytes = analyser.process(&samples).unwrap();
        let peak = bytes
            .iter()
            .enumerate()
            .max_by_key(|(_, value)| **value)
            .map(|(index, _)| index)
            .unwrap();
        let expected = bin_index(tone_hz, config.fft_size, config.sample_rate);
        assert!(peak.abs_diff(expected) <= 1, "peak at {peak}, expected {expected}");
    }

    #[test]
    fn silence_yields_zero_bytes() {
        let mut analyser = SpectrumAnalyser::new(&config()).unwrap();
        let bytes = analyser.process(&[0.0; 256]).unwrap();
        assert!(bytes.iter().all(|b| *b == 0));
        assert!(analyser.process(&[]).is_err());
    }
}
