//! Biquad filters and a table waveshaper.
//!
//! Coefficients follow the Audio EQ Cookbook formulas. Filters run in f64
//! and keep their own delay lines, one instance per voice.

use std::f64::consts::PI;

/// Biquad filter coefficients, normalized by a0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Angular frequency terms, with the cutoff kept below Nyquist.
    fn omega(frequency: f64, sample_rate: f64) -> (f64, f64) {
        let nyquist = sample_rate / 2.0;
        let frequency = frequency.clamp(1.0, nyquist * 0.999);
        let omega = 2.0 * PI * frequency / sample_rate;
        (omega.sin(), omega.cos())
    }

    /// Creates lowpass filter coefficients.
    ///
    /// # Arguments
    /// * `cutoff` - Cutoff frequency in Hz
    /// * `q` - Q factor, clamped to at least 0.5
    /// * `sample_rate` - Audio sample rate in Hz
    pub fn lowpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let (sin_omega, cos_omega) = Self::omega(cutoff, sample_rate);
        let alpha = sin_omega / (2.0 * q.max(0.5));

        Self::normalized(
            (1.0 - cos_omega) / 2.0,
            1.0 - cos_omega,
            (1.0 - cos_omega) / 2.0,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    /// Creates bandpass filter coefficients (constant 0 dB peak gain).
    ///
    /// # Arguments
    /// * `center` - Center frequency in Hz
    /// * `q` - Q factor (bandwidth = center / Q), clamped to at least 0.5
    /// * `sample_rate` - Audio sample rate in Hz
    pub fn bandpass(center: f64, q: f64, sample_rate: f64) -> Self {
        let (sin_omega, cos_omega) = Self::omega(center, sample_rate);
        let alpha = sin_omega / (2.0 * q.max(0.5));

        Self::normalized(
            alpha,
            0.0,
            -alpha,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }
}

/// Biquad filter state (direct form I).
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadFilter {
    /// Creates a new biquad filter with the given coefficients.
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Creates a lowpass filter.
    pub fn lowpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        Self::new(BiquadCoeffs::lowpass(cutoff, q, sample_rate))
    }

    /// Creates a bandpass filter.
    pub fn bandpass(center: f64, q: f64, sample_rate: f64) -> Self {
        Self::new(BiquadCoeffs::bandpass(center, q, sample_rate))
    }

    /// Processes a single sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let c = &self.coeffs;
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2
            - c.a1 * self.y1
            - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Filters a buffer in place.
    pub fn process_buffer(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

/// Number of points in a waveshaper curve.
pub const CURVE_POINTS: usize = 256;

/// Maps input samples through a sampled transfer curve.
///
/// The curve spans inputs -1..1; inputs outside are clamped to the ends and
/// values between points are interpolated linearly.
#[derive(Debug, Clone)]
pub struct WaveShaper {
    curve: Vec<f64>,
}

impl WaveShaper {
    /// Builds a curve by sampling `f` at `CURVE_POINTS` evenly spaced
    /// points from -1 to 1 inclusive.
    pub fn from_fn(f: impl Fn(f64) -> f64) -> Self {
        let last = (CURVE_POINTS - 1) as f64;
        let curve = (0..CURVE_POINTS)
            .map(|i| f(2.0 * i as f64 / last - 1.0))
            .collect();
        Self { curve }
    }

    /// Soft saturation, `tanh(2x) * 0.8`.
    pub fn soft_saturation() -> Self {
        Self::from_fn(|x| (x * 2.0).tanh() * 0.8)
    }

    /// Shapes a single sample.
    #[inline]
    pub fn process(&self, input: f64) -> f64 {
        let last = self.curve.len() - 1;
        let position = (input.clamp(-1.0, 1.0) + 1.0) / 2.0 * last as f64;
        let index = position.floor() as usize;
        if index >= last {
            return self.curve[last];
        }
        let frac = position - index as f64;
        self.curve[index] + (self.curve[index + 1] - self.curve[index]) * frac
    }

    /// Shapes a buffer in place.
    pub fn process_buffer(&self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::oscillator::Oscillator;
    use crate::score::Waveform;

    const SR: f64 = 44100.0;

    fn rms_after_filter(filter: &mut BiquadFilter, freq: f64) -> f64 {
        let mut buf = vec![0.0; 8820];
        Oscillator::new(Waveform::Sine, freq).render_add(SR, 1.0, &mut buf);
        filter.process_buffer(&mut buf);
        // Skip the transient.
        let tail = &buf[4410..];
        (tail.iter().map(|s| s * s).sum::<f64>() / tail.len() as f64).sqrt()
    }

    #[test]
    fn test_lowpass_attenuates_highs() {
        let low = rms_after_filter(&mut BiquadFilter::lowpass(500.0, 0.707, SR), 100.0);
        let high = rms_after_filter(&mut BiquadFilter::lowpass(500.0, 0.707, SR), 8000.0);
        assert!(low > 0.6);
        assert!(high < 0.05);
    }

    #[test]
    fn test_bandpass_passes_center() {
        let center = rms_after_filter(&mut BiquadFilter::bandpass(1000.0, 2.0, SR), 1000.0);
        let far = rms_after_filter(&mut BiquadFilter::bandpass(1000.0, 2.0, SR), 100.0);
        assert!(center > 0.6);
        assert!(far < center / 4.0);
    }

    #[test]
    fn test_cutoff_above_nyquist_is_stable() {
        let mut filter = BiquadFilter::lowpass(40000.0, 1.0, SR);
        for _ in 0..1000 {
            assert!(filter.process(1.0).is_finite());
        }
    }

    #[test]
    fn test_waveshaper_curve() {
        let shaper = WaveShaper::soft_saturation();
        assert!(shaper.process(0.0).abs() < 1e-12);
        assert!(shaper.process(1.0) <= 0.8);
        assert!(shaper.process(5.0) <= 0.8);
        assert!(shaper.process(-5.0) >= -0.8);
        // Monotonic
        assert!(shaper.process(0.2) < shaper.process(0.4));
    }
}
