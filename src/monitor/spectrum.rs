use std::sync::Arc;

use rustfft::{num_complex::Complex32, Fft, FftPlanner};

use crate::monitor::error::MonitorError;

/// Magnitude spectrum of one channel's analysis window.
///
/// Holds the non-negative magnitudes of the positive-frequency half-spectrum;
/// bin `k` represents `k * sample_rate / fft_size` Hz, with DC at bin 0.
#[derive(Clone, Debug)]
pub struct MagnitudeSpectrum {
    sample_rate_hz: f32,
    fft_size: usize,
    magnitudes: Vec<f32>,
}

impl MagnitudeSpectrum {
    /// Build a spectrum from precomputed bins. Useful for diagnostics and
    /// deterministic tests; normal operation goes through [`SpectrumBuilder`].
    pub fn from_bins(sample_rate_hz: f32, fft_size: usize, magnitudes: Vec<f32>) -> Self {
        Self {
            sample_rate_hz,
            fft_size,
            magnitudes,
        }
    }

    /// Width of one frequency bin in Hz.
    pub fn resolution_hz(&self) -> f32 {
        self.sample_rate_hz / self.fft_size as f32
    }

    /// Center frequency of bin `k`.
    pub fn bin_hz(&self, k: usize) -> f32 {
        k as f32 * self.resolution_hz()
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }
}

/// Computes magnitude spectra for a fixed transform size.
///
/// The rustfft plan (and its twiddle tables) is created once here and reused
/// for every epoch; `compute` never mutates its input window.
pub struct SpectrumBuilder {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectrumBuilder {
    pub fn new(fft_size: usize) -> Result<Self, MonitorError> {
        if fft_size < 2 || !fft_size.is_power_of_two() {
            return Err(MonitorError::FftSizeNotPowerOfTwo(fft_size));
        }
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);
        Ok(Self { fft_size, fft })
    }

    /// Transform one analysis window into a half-spectrum of magnitudes.
    ///
    /// The window mean is subtracted before the transform (DC removal) and the
    /// centered samples are zero-padded up to the transform size. Magnitudes
    /// are left unnormalized so band powers stay comparable to the fixed
    /// classification thresholds.
    pub fn compute(
        &self,
        window: &[f32],
        sample_rate_hz: f32,
    ) -> Result<MagnitudeSpectrum, MonitorError> {
        if window.is_empty() {
            return Err(MonitorError::EmptyWindow);
        }
        if window.len() > self.fft_size {
            return Err(MonitorError::WindowExceedsFft {
                needed: window.len(),
                fft_size: self.fft_size,
            });
        }
        let mean = window.iter().sum::<f32>() / window.len() as f32;
        let mut buffer: Vec<Complex32> = window
            .iter()
            .map(|&v| Complex32::new(v - mean, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex32::ZERO);
        self.fft.process(&mut buffer);
        let magnitudes = buffer
            .iter()
            .take(self.fft_size / 2)
            .map(|c| c.norm())
            .collect();
        Ok(MagnitudeSpectrum {
            sample_rate_hz,
            fft_size: self.fft_size,
            magnitudes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_frequency_mapping() {
        let spectrum = MagnitudeSpectrum::from_bins(52.0, 256, vec![0.0; 128]);
        assert!((spectrum.resolution_hz() - 52.0 / 256.0).abs() < 1e-6);
        assert!((spectrum.bin_hz(20) - 20.0 * 52.0 / 256.0).abs() < 1e-5);
        assert_eq!(spectrum.bin_hz(0), 0.0);
    }

    #[test]
    fn rejects_non_power_of_two() {
        assert!(matches!(
            SpectrumBuilder::new(100),
            Err(MonitorError::FftSizeNotPowerOfTwo(100))
        ));
    }

    #[test]
    fn rejects_window_longer_than_transform() {
        let builder = SpectrumBuilder::new(64).unwrap();
        let window = vec![0.0; 65];
        assert!(matches!(
            builder.compute(&window, 52.0),
            Err(MonitorError::WindowExceedsFft { needed: 65, .. })
        ));
    }

    #[test]
    fn constant_window_has_no_energy_after_dc_removal() {
        let builder = SpectrumBuilder::new(256).unwrap();
        let window = vec![1.0; 156];
        let spectrum = builder.compute(&window, 52.0).unwrap();
        for &m in spectrum.magnitudes() {
            assert!(m < 1e-3);
        }
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        // 20 * (52 / 256) = 4.0625 Hz lands exactly on bin 20.
        let builder = SpectrumBuilder::new(256).unwrap();
        let freq = 20.0 * 52.0 / 256.0;
        let window: Vec<f32> = (0..156)
            .map(|i| (std::f32::consts::TAU * freq * i as f32 / 52.0).sin())
            .collect();
        let spectrum = builder.compute(&window, 52.0).unwrap();
        let peak_bin = spectrum
            .magnitudes()
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak_bin, 20);
    }

    #[test]
    fn compute_does_not_modify_input() {
        let builder = SpectrumBuilder::new(64).unwrap();
        let window: Vec<f32> = (0..64).map(|i| i as f32).collect();
        let copy = window.clone();
        builder.compute(&window, 52.0).unwrap();
        assert_eq!(window, copy);
    }
}
