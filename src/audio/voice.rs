//! Per-note synthesis.
//!
//! A [`VoiceRequest`] describes one note to sound; [`Voice::build`] validates
//! it against a [`RenderContext`] and picks the signal chain for its
//! instrument. Rendering is a pure function of the request and context, so
//! the live transport and the offline renderer produce the same samples.

use super::automation::{Automation, SILENCE_FLOOR};
use super::buffer::{frames_for, StereoBuffer};
use super::dynamics::{Compressor, CompressorSettings};
use super::filter::{BiquadFilter, WaveShaper};
use super::oscillator::{NoiseSource, Oscillator};
use super::SAMPLE_RATE;
use crate::error::SynthesisError;
use crate::score::{
    drum_voice, instrument, pitch_to_frequency, DrumVoiceDescriptor, Excitation, Note,
    SynthesisAlgorithm, Waveform,
};
use tracing::warn;

/// Master volume used when nothing else is configured.
pub const DEFAULT_MASTER_VOLUME: f32 = 0.7;

/// Snapshot of the values a voice reads when it is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Master volume (0.0-1.0) multiplied into every voice's peak.
    pub master_volume: f32,
}

impl RenderContext {
    /// Context at the standard sample rate.
    pub fn new(master_volume: f32) -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            master_volume,
        }
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(DEFAULT_MASTER_VOLUME)
    }
}

/// Everything needed to sound one note.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceRequest {
    pub pitch: u8,
    /// Offset from the start of the score in seconds.
    pub start: f64,
    pub duration: f64,
    pub velocity: f32,
    pub instrument: String,
    pub drum: Option<String>,
}

impl VoiceRequest {
    /// First frame of this voice in a buffer at `sample_rate`.
    pub fn offset_frames(&self, sample_rate: u32) -> usize {
        (self.start * sample_rate as f64).round().max(0.0) as usize
    }

    /// Noise seed derived from the request, so equal requests sound equal.
    ///
    /// BLAKE3 over the little-endian fields, truncated to 64 bits. The
    /// instrument id is length-prefixed so it cannot run into the drum id.
    fn seed(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[self.pitch]);
        hasher.update(&self.start.to_bits().to_le_bytes());
        hasher.update(&self.duration.to_bits().to_le_bytes());
        hasher.update(&(self.instrument.len() as u64).to_le_bytes());
        hasher.update(self.instrument.as_bytes());
        if let Some(drum) = &self.drum {
            hasher.update(drum.as_bytes());
        }

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }
}

impl From<&Note> for VoiceRequest {
    fn from(note: &Note) -> Self {
        Self {
            pitch: note.pitch,
            start: note.start,
            duration: note.duration,
            velocity: note.velocity,
            instrument: note.instrument.clone(),
            drum: note.drum.clone(),
        }
    }
}

/// Pitch, length and level shared by the melodic voices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f64,
    pub duration: f64,
    pub peak: f64,
}

/// A fully resolved signal chain for one note.
#[derive(Debug, Clone, PartialEq)]
pub enum Voice {
    Basic(Waveform, Tone),
    BowedString(Tone),
    StruckString(Tone),
    PluckedString { tone: Tone, seed: u64 },
    Bass(Tone),
    NoiseDrum {
        drum: &'static DrumVoiceDescriptor,
        peak: f64,
        seed: u64,
    },
    ToneDrum {
        drum: &'static DrumVoiceDescriptor,
        peak: f64,
    },
}

impl Voice {
    /// Resolves a request into a voice.
    ///
    /// Unknown instruments, and percussion notes without a known drum id,
    /// fall back to the sine voice.
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError` if the sample rate is zero or the request
    /// has a non-finite or non-positive frequency or duration, or a negative
    /// start.
    pub fn build(request: &VoiceRequest, ctx: RenderContext) -> Result<Self, SynthesisError> {
        if ctx.sample_rate == 0 {
            return Err(SynthesisError::InvalidSampleRate(ctx.sample_rate));
        }
        if !request.start.is_finite() || request.start < 0.0 {
            return Err(SynthesisError::InvalidStart(request.start));
        }
        if !request.duration.is_finite() || request.duration <= 0.0 {
            return Err(SynthesisError::InvalidDuration(request.duration));
        }
        let frequency = pitch_to_frequency(request.pitch);
        if request.pitch > 127 || !frequency.is_finite() || frequency <= 0.0 {
            return Err(SynthesisError::InvalidFrequency(frequency));
        }

        let peak = request.velocity.clamp(0.0, 1.0) as f64 * ctx.master_volume.max(0.0) as f64;
        let tone = Tone {
            frequency,
            duration: request.duration,
            peak,
        };

        let algorithm = match instrument(&request.instrument) {
            Some(descriptor) => descriptor.algorithm,
            None => {
                warn!(instrument = %request.instrument, "Unknown instrument, using sine");
                SynthesisAlgorithm::Basic(Waveform::Sine)
            }
        };

        let voice = match algorithm {
            SynthesisAlgorithm::Basic(waveform) => Voice::Basic(waveform, tone),
            SynthesisAlgorithm::BowedString => Voice::BowedString(tone),
            SynthesisAlgorithm::StruckString => Voice::StruckString(tone),
            SynthesisAlgorithm::PluckedString => Voice::PluckedString {
                tone,
                seed: request.seed(),
            },
            SynthesisAlgorithm::Bass => Voice::Bass(tone),
            SynthesisAlgorithm::Percussion => match request.drum.as_deref().and_then(drum_voice) {
                Some(drum) if drum.excitation == Excitation::Noise => Voice::NoiseDrum {
                    drum,
                    peak,
                    seed: request.seed(),
                },
                Some(drum) => Voice::ToneDrum { drum, peak },
                None => {
                    warn!(drum = ?request.drum, "Missing or unknown drum voice, using sine");
                    Voice::Basic(Waveform::Sine, tone)
                }
            },
        };
        Ok(voice)
    }

    /// How long the voice sounds, in seconds.
    pub fn length_seconds(&self) -> f64 {
        match self {
            Voice::Basic(_, tone)
            | Voice::BowedString(tone)
            | Voice::StruckString(tone)
            | Voice::PluckedString { tone, .. }
            | Voice::Bass(tone) => tone.duration,
            Voice::NoiseDrum { drum, .. } | Voice::ToneDrum { drum, .. } => drum.decay,
        }
    }

    /// Renders the voice as mono samples starting at its own time zero.
    pub fn render(&self, sample_rate: u32) -> Vec<f64> {
        let sr = sample_rate as f64;
        let frames = frames_for(self.length_seconds(), sample_rate);

        match *self {
            Voice::Basic(waveform, tone) => {
                let mut out = mix(sr, frames, &[(waveform, tone.frequency, 1.0)]);
                let envelope = Automation::new(0.0)
                    .set_value_at(0.0, 0.0)
                    .linear_ramp_to(0.01, tone.peak)
                    .exponential_ramp_to(tone.duration, SILENCE_FLOOR);
                apply_gain(&mut out, &envelope, sr);
                out
            }
            Voice::BowedString(tone) => {
                let f = tone.frequency;
                let mut out = mix(
                    sr,
                    frames,
                    &[
                        (Waveform::Sawtooth, f, 0.7),
                        (Waveform::Sine, f * 2.0, 0.2),
                        (Waveform::Sine, f * 3.0, 0.1),
                    ],
                );
                let p = tone.peak;
                let envelope = Automation::new(0.0)
                    .set_value_at(0.0, 0.0)
                    .linear_ramp_to(0.1, p * 0.8)
                    .exponential_ramp_to(0.3, p * 0.6)
                    .set_value_at(tone.duration - 0.2, p * 0.4)
                    .exponential_ramp_to(tone.duration, SILENCE_FLOOR);
                apply_gain(&mut out, &envelope, sr);
                BiquadFilter::lowpass(f * 4.0, 1.0, sr).process_buffer(&mut out);
                out
            }
            Voice::StruckString(tone) => {
                let f = tone.frequency;
                let p = tone.peak;
                let partials: Vec<(Waveform, f64, f64)> = PIANO_PARTIALS
                    .iter()
                    .enumerate()
                    .map(|(i, amplitude)| {
                        let waveform = if i == 0 {
                            Waveform::Triangle
                        } else {
                            Waveform::Sine
                        };
                        (waveform, f * (i + 1) as f64, amplitude * p)
                    })
                    .collect();
                let mut out = mix(sr, frames, &partials);
                let envelope = Automation::new(0.0)
                    .set_value_at(0.0, 0.0)
                    .linear_ramp_to(0.01, p)
                    .exponential_ramp_to(0.1, p * 0.3)
                    .exponential_ramp_to(tone.duration * 0.5, p * 0.1)
                    .exponential_ramp_to(tone.duration, SILENCE_FLOOR);
                apply_gain(&mut out, &envelope, sr);
                Compressor::new(CompressorSettings::PIANO, sr).process_buffer(&mut out);
                out
            }
            Voice::PluckedString { tone, seed } => {
                let f = tone.frequency;
                let p = tone.peak;
                let mut out = mix(
                    sr,
                    frames,
                    &[(Waveform::Sawtooth, f, 1.0), (Waveform::Triangle, f * 2.1, 1.0)],
                );
                let envelope = Automation::new(0.0)
                    .set_value_at(0.0, 0.0)
                    .linear_ramp_to(0.02, p * 0.8)
                    .exponential_ramp_to(0.1, p * 0.4)
                    .exponential_ramp_to(tone.duration * 0.7, p * 0.2)
                    .exponential_ramp_to(tone.duration, SILENCE_FLOOR);
                apply_gain(&mut out, &envelope, sr);

                // Pick noise, first 100 ms only
                let burst = Automation::new(0.0)
                    .set_value_at(0.0, p * 0.05)
                    .exponential_ramp_to(PICK_NOISE_SECONDS, SILENCE_FLOOR);
                let mut noise = NoiseSource::new(seed);
                let burst_frames = frames_for(PICK_NOISE_SECONDS, sample_rate).min(frames);
                for (i, slot) in out[..burst_frames].iter_mut().enumerate() {
                    *slot += noise.next_sample() * burst.value_at(i as f64 / sr);
                }

                BiquadFilter::bandpass(f * 2.0, 2.0, sr).process_buffer(&mut out);
                out.iter_mut().for_each(|s| *s *= 0.8);
                out
            }
            Voice::Bass(tone) => {
                let f = tone.frequency;
                let p = tone.peak;
                let mut out = mix(
                    sr,
                    frames,
                    &[(Waveform::Sawtooth, f, 1.0), (Waveform::Square, f * 1.01, 1.0)],
                );
                let envelope = Automation::new(0.0)
                    .set_value_at(0.0, 0.0)
                    .linear_ramp_to(0.01, p * 0.9)
                    .exponential_ramp_to(0.05, p * 0.7)
                    .exponential_ramp_to(tone.duration * 0.8, p * 0.3)
                    .exponential_ramp_to(tone.duration, SILENCE_FLOOR);
                apply_gain(&mut out, &envelope, sr);

                let mut sub = mix(sr, frames, &[(Waveform::Sine, f * 0.5, 1.0)]);
                let sub_envelope = Automation::new(0.0)
                    .set_value_at(0.0, p * 0.4)
                    .exponential_ramp_to(tone.duration, SILENCE_FLOOR);
                apply_gain(&mut sub, &sub_envelope, sr);
                for (o, s) in out.iter_mut().zip(&sub) {
                    *o += s;
                }

                BiquadFilter::lowpass(f * 3.0, 1.5, sr).process_buffer(&mut out);
                WaveShaper::soft_saturation().process_buffer(&mut out);
                out
            }
            Voice::NoiseDrum { drum, peak, seed } => {
                let mut noise = NoiseSource::new(seed);
                let decay_frames = frames as f64 * 0.1;
                let mut out: Vec<f64> = (0..frames)
                    .map(|i| noise.next_sample() * (-(i as f64) / decay_frames).exp())
                    .collect();
                let q = if drum.is_hihat() { 0.5 } else { 2.0 };
                BiquadFilter::bandpass(drum.frequency, q, sr).process_buffer(&mut out);
                let envelope = Automation::new(0.0)
                    .set_value_at(0.0, peak)
                    .exponential_ramp_to(drum.decay, SILENCE_FLOOR);
                apply_gain(&mut out, &envelope, sr);
                out
            }
            Voice::ToneDrum { drum, peak } => {
                let base = drum.frequency;
                let sweep = Automation::new(base)
                    .set_value_at(0.0, base)
                    .exponential_ramp_to(0.1, base * 0.1);
                let mut osc = Oscillator::with_frequency(Waveform::Sine, sweep);
                let mut out = vec![0.0; frames];
                osc.render_add(sr, 1.0, &mut out);
                BiquadFilter::lowpass(base * 4.0, 1.0, sr).process_buffer(&mut out);
                let envelope = Automation::new(0.0)
                    .set_value_at(0.0, peak)
                    .exponential_ramp_to(drum.decay, SILENCE_FLOOR);
                apply_gain(&mut out, &envelope, sr);
                out
            }
        }
    }
}

/// Relative amplitudes of the piano partials, fundamental first.
const PIANO_PARTIALS: [f64; 6] = [1.0, 0.5, 0.25, 0.125, 0.0625, 0.03125];

/// Length of the guitar pick noise.
const PICK_NOISE_SECONDS: f64 = 0.1;

/// Sums fixed-frequency oscillators, each `(waveform, frequency, gain)`.
fn mix(sample_rate: f64, frames: usize, oscillators: &[(Waveform, f64, f64)]) -> Vec<f64> {
    let mut out = vec![0.0; frames];
    for &(waveform, frequency, gain) in oscillators {
        Oscillator::new(waveform, frequency).render_add(sample_rate, gain, &mut out);
    }
    out
}

fn apply_gain(buffer: &mut [f64], gain: &Automation, sample_rate: f64) {
    let mut envelope = vec![0.0; buffer.len()];
    gain.render(sample_rate, &mut envelope);
    for (sample, g) in buffer.iter_mut().zip(&envelope) {
        *sample *= g;
    }
}

/// Builds and renders one voice, summing it into `dest` at the request's
/// start offset.
///
/// # Errors
///
/// Returns `SynthesisError` if the voice cannot be built; `dest` is left
/// untouched.
pub fn synthesize(
    request: &VoiceRequest,
    ctx: RenderContext,
    dest: &mut StereoBuffer,
) -> Result<(), SynthesisError> {
    let voice = Voice::build(request, ctx)?;
    let samples = voice.render(ctx.sample_rate);
    dest.add_mono_at(request.offset_frames(ctx.sample_rate), &samples);
    Ok(())
}
