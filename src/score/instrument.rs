//! Built-in instrument and drum voice catalogs.
//!
//! The set of synthesis algorithms is closed: every instrument maps onto one
//! [`SynthesisAlgorithm`] and the voice engine dispatches on that tag.

use serde::{Deserialize, Serialize};

/// Basic oscillator waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Signal-graph topology used to voice an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynthesisAlgorithm {
    /// One oscillator with a short attack and exponential release.
    Basic(Waveform),
    /// Three harmonics through a low-pass filter (violin).
    BowedString,
    /// Six decaying partials through a compressor (piano).
    StruckString,
    /// Detuned oscillators plus a pick noise burst (acoustic guitar).
    PluckedString,
    /// Detuned oscillators, sub-oscillator and saturation (bass guitar).
    Bass,
    /// Drum voice selected by the note's drum id.
    Percussion,
}

/// Broad grouping used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentCategory {
    Synth,
    Acoustic,
    Percussion,
}

/// Describes one playable instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentDescriptor {
    /// Identifier stored on notes.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Synthesis algorithm tag.
    pub algorithm: SynthesisAlgorithm,
    /// Category for grouping.
    pub category: InstrumentCategory,
}

/// How a drum voice is excited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Excitation {
    /// Filtered noise burst (snares, hihats, cymbals).
    Noise,
    /// Pitch-swept sine (kicks, toms).
    Tone,
    /// Kicks and toms tagged as mixed; voiced like `Tone`.
    Mixed,
}

/// Describes one drum voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrumVoiceDescriptor {
    /// Identifier stored on percussion notes.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Pitch code used when the drum is placed on the grid.
    pub pitch: u8,
    /// Center (noise) or base (tone) frequency in Hz.
    pub frequency: f64,
    /// Decay time in seconds.
    pub decay: f64,
    /// Excitation type.
    pub excitation: Excitation,
}

impl DrumVoiceDescriptor {
    /// Hihats use a wider band-pass than the other noise drums.
    pub fn is_hihat(&self) -> bool {
        self.id.contains("hihat")
    }
}

/// All built-in instruments.
pub const INSTRUMENTS: &[InstrumentDescriptor] = &[
    InstrumentDescriptor {
        id: "sine",
        name: "Synth",
        algorithm: SynthesisAlgorithm::Basic(Waveform::Sine),
        category: InstrumentCategory::Synth,
    },
    InstrumentDescriptor {
        id: "square",
        name: "Square",
        algorithm: SynthesisAlgorithm::Basic(Waveform::Square),
        category: InstrumentCategory::Synth,
    },
    InstrumentDescriptor {
        id: "sawtooth",
        name: "Sawtooth",
        algorithm: SynthesisAlgorithm::Basic(Waveform::Sawtooth),
        category: InstrumentCategory::Synth,
    },
    InstrumentDescriptor {
        id: "triangle",
        name: "Triangle",
        algorithm: SynthesisAlgorithm::Basic(Waveform::Triangle),
        category: InstrumentCategory::Synth,
    },
    InstrumentDescriptor {
        id: "piano",
        name: "Piano",
        algorithm: SynthesisAlgorithm::StruckString,
        category: InstrumentCategory::Acoustic,
    },
    InstrumentDescriptor {
        id: "violin",
        name: "Violin",
        algorithm: SynthesisAlgorithm::BowedString,
        category: InstrumentCategory::Acoustic,
    },
    InstrumentDescriptor {
        id: "acoustic-guitar",
        name: "Acoustic Guitar",
        algorithm: SynthesisAlgorithm::PluckedString,
        category: InstrumentCategory::Acoustic,
    },
    InstrumentDescriptor {
        id: "bass-guitar",
        name: "Bass Guitar",
        algorithm: SynthesisAlgorithm::Bass,
        category: InstrumentCategory::Acoustic,
    },
    InstrumentDescriptor {
        id: "drums",
        name: "Drums",
        algorithm: SynthesisAlgorithm::Percussion,
        category: InstrumentCategory::Percussion,
    },
];

/// All built-in drum voices.
pub const DRUM_VOICES: &[DrumVoiceDescriptor] = &[
    DrumVoiceDescriptor {
        id: "kick",
        name: "Kick",
        pitch: 36,
        frequency: 60.0,
        decay: 0.3,
        excitation: Excitation::Mixed,
    },
    DrumVoiceDescriptor {
        id: "kick2",
        name: "Deep Kick",
        pitch: 35,
        frequency: 50.0,
        decay: 0.4,
        excitation: Excitation::Mixed,
    },
    DrumVoiceDescriptor {
        id: "snare",
        name: "Snare",
        pitch: 38,
        frequency: 200.0,
        decay: 0.1,
        excitation: Excitation::Noise,
    },
    DrumVoiceDescriptor {
        id: "snare2",
        name: "Bright Snare",
        pitch: 40,
        frequency: 250.0,
        decay: 0.1,
        excitation: Excitation::Noise,
    },
    DrumVoiceDescriptor {
        id: "hihat-closed",
        name: "Closed Hihat",
        pitch: 42,
        frequency: 8000.0,
        decay: 0.05,
        excitation: Excitation::Noise,
    },
    DrumVoiceDescriptor {
        id: "hihat-open",
        name: "Open Hihat",
        pitch: 46,
        frequency: 6000.0,
        decay: 0.3,
        excitation: Excitation::Noise,
    },
    DrumVoiceDescriptor {
        id: "tom-high",
        name: "High Tom",
        pitch: 50,
        frequency: 300.0,
        decay: 0.2,
        excitation: Excitation::Mixed,
    },
    DrumVoiceDescriptor {
        id: "tom-mid",
        name: "Mid Tom",
        pitch: 48,
        frequency: 200.0,
        decay: 0.3,
        excitation: Excitation::Mixed,
    },
    DrumVoiceDescriptor {
        id: "tom-floor",
        name: "Floor Tom",
        pitch: 45,
        frequency: 100.0,
        decay: 0.4,
        excitation: Excitation::Mixed,
    },
    DrumVoiceDescriptor {
        id: "crash",
        name: "Crash Cymbal",
        pitch: 49,
        frequency: 3000.0,
        decay: 1.0,
        excitation: Excitation::Noise,
    },
    DrumVoiceDescriptor {
        id: "ride",
        name: "Ride Cymbal",
        pitch: 51,
        frequency: 2000.0,
        decay: 0.8,
        excitation: Excitation::Noise,
    },
];

/// Looks up an instrument by id.
pub fn instrument(id: &str) -> Option<&'static InstrumentDescriptor> {
    INSTRUMENTS.iter().find(|i| i.id == id)
}

/// Returns every built-in instrument.
pub fn instruments() -> &'static [InstrumentDescriptor] {
    INSTRUMENTS
}

/// Returns the instruments belonging to a category.
pub fn instruments_in(
    category: InstrumentCategory,
) -> impl Iterator<Item = &'static InstrumentDescriptor> {
    INSTRUMENTS.iter().filter(move |i| i.category == category)
}

/// Looks up a drum voice by id.
pub fn drum_voice(id: &str) -> Option<&'static DrumVoiceDescriptor> {
    DRUM_VOICES.iter().find(|d| d.id == id)
}
