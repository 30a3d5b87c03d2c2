//! Feed-forward soft-knee compressor used by the piano voice.

/// Convert linear amplitude to decibels.
#[inline]
fn amplitude_to_db(amp: f64) -> f64 {
    if amp <= 1e-6 {
        -120.0 // Floor
    } else {
        20.0 * amp.log10()
    }
}

/// Convert decibels to linear amplitude.
#[inline]
fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Calculate smoothing coefficient from time constant.
#[inline]
fn time_to_coeff(time_seconds: f64, sample_rate: f64) -> f64 {
    if time_seconds <= 0.0 {
        0.0
    } else {
        (-1.0 / (time_seconds * sample_rate)).exp()
    }
}

/// Fixed compressor settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f64,
    pub knee_db: f64,
    pub ratio: f64,
    pub attack: f64,
    pub release: f64,
}

impl CompressorSettings {
    /// Settings that tame the piano partial stack.
    pub const PIANO: CompressorSettings = CompressorSettings {
        threshold_db: -24.0,
        knee_db: 30.0,
        ratio: 12.0,
        attack: 0.003,
        release: 0.25,
    };
}

/// Compressor state for one voice.
#[derive(Debug, Clone)]
pub struct Compressor {
    settings: CompressorSettings,
    attack_coeff: f64,
    release_coeff: f64,
    gain_reduction: f64,
}

impl Compressor {
    pub fn new(settings: CompressorSettings, sample_rate: f64) -> Self {
        Self {
            settings,
            attack_coeff: time_to_coeff(settings.attack, sample_rate),
            release_coeff: time_to_coeff(settings.release, sample_rate),
            gain_reduction: 0.0,
        }
    }

    /// Static gain curve: dB of reduction for a given input level.
    fn compute_gain_reduction(&self, input_db: f64) -> f64 {
        let CompressorSettings {
            threshold_db: threshold,
            knee_db: knee,
            ratio,
            ..
        } = self.settings;
        let ratio = ratio.max(1.0);

        if knee <= 0.0 {
            return (input_db - threshold).max(0.0) * (1.0 - 1.0 / ratio);
        }

        let half_knee = knee / 2.0;
        let below = threshold - half_knee;
        let above = threshold + half_knee;

        if input_db <= below {
            0.0
        } else if input_db >= above {
            (input_db - threshold) * (1.0 - 1.0 / ratio)
        } else {
            // Quadratic interpolation through the knee
            let x = input_db - below;
            (1.0 - 1.0 / ratio) * x * x / (2.0 * knee)
        }
    }

    /// Compresses one sample.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let target = self.compute_gain_reduction(amplitude_to_db(input.abs()));

        let coeff = if target > self.gain_reduction {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.gain_reduction = coeff * self.gain_reduction + (1.0 - coeff) * target;

        input * db_to_amplitude(-self.gain_reduction)
    }

    /// Compresses a buffer in place.
    pub fn process_buffer(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Current gain reduction in dB.
    pub fn gain_reduction_db(&self) -> f64 {
        self.gain_reduction
    }
}
