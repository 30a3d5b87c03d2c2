//! Phase-accumulating oscillators and a seeded noise source.

use super::automation::Automation;
use crate::score::Waveform;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::f64::consts::TAU;

/// Evaluates one cycle of a waveform at `phase` in [0, 1).
///
/// All shapes start at zero phase on a zero crossing except square,
/// which starts high.
#[inline]
pub fn waveform_sample(waveform: Waveform, phase: f64) -> f64 {
    match waveform {
        Waveform::Sine => (TAU * phase).sin(),
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Sawtooth => 2.0 * ((phase + 0.5) % 1.0) - 1.0,
        Waveform::Triangle => {
            if phase < 0.25 {
                4.0 * phase
            } else if phase < 0.75 {
                2.0 - 4.0 * phase
            } else {
                4.0 * phase - 4.0
            }
        }
    }
}

/// A single oscillator whose frequency may follow an automation timeline.
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    frequency: Automation,
    phase: f64,
}

impl Oscillator {
    /// Creates an oscillator at a fixed frequency.
    pub fn new(waveform: Waveform, frequency: f64) -> Self {
        Self::with_frequency(waveform, Automation::constant(frequency))
    }

    /// Creates an oscillator whose frequency follows `frequency`.
    pub fn with_frequency(waveform: Waveform, frequency: Automation) -> Self {
        Self {
            waveform,
            frequency,
            phase: 0.0,
        }
    }

    /// Produces the sample at `time` and advances the phase by one sample.
    #[inline]
    pub fn next_sample(&mut self, time: f64, sample_rate: f64) -> f64 {
        let out = waveform_sample(self.waveform, self.phase);
        self.phase = (self.phase + self.frequency.value_at(time) / sample_rate).fract();
        out
    }

    /// Adds `gain * signal` into `out`, starting at time zero.
    pub fn render_add(&mut self, sample_rate: f64, gain: f64, out: &mut [f64]) {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot += gain * self.next_sample(i as f64 / sample_rate, sample_rate);
        }
    }
}

/// Uniform white noise in [-1, 1) from a deterministic generator.
#[derive(Debug, Clone)]
pub struct NoiseSource {
    rng: Pcg32,
}

impl NoiseSource {
    /// Creates a noise source; equal seeds give equal sequences.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Returns the next noise sample.
    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        self.rng.gen_range(-1.0..1.0)
    }
}
