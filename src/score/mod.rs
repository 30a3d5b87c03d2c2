//! Score data structures for representing a composition.
//!
//! This module provides the core types for representing notes, the two note
//! layers of a composition (melody and generated harmony), and the built-in
//! instrument and drum catalogs the synthesis engine dispatches on.

mod composition;
mod instrument;
mod note;

pub use composition::{Composition, Layers};
pub use instrument::{
    drum_voice, instrument, instruments, instruments_in, DrumVoiceDescriptor, Excitation,
    InstrumentCategory, InstrumentDescriptor, SynthesisAlgorithm, Waveform, DRUM_VOICES,
    INSTRUMENTS,
};
pub use note::{ChordTag, HarmonicFunction, Note, NoteId, DRUM_NOTE_DURATION};

/// Standard note names for display purposes.
/// Maps a pitch class (0-11) to its name within an octave.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Reference pitch (A4) in Hz.
pub const CONCERT_A_HZ: f64 = 440.0;

/// MIDI note number of the reference pitch.
pub const CONCERT_A_PITCH: u8 = 69;

/// Converts a MIDI note number to its equal-tempered frequency.
///
/// # Arguments
///
/// * `pitch` - MIDI note number (0-127)
///
/// # Returns
///
/// Frequency in Hz, with A4 (69) at exactly 440 Hz
///
/// # Examples
///
/// ```
/// use scorecraft::score::pitch_to_frequency;
///
/// assert_eq!(pitch_to_frequency(69), 440.0);
/// ```
pub fn pitch_to_frequency(pitch: u8) -> f64 {
    let semitones = pitch as f64 - CONCERT_A_PITCH as f64;
    CONCERT_A_HZ * 2f64.powf(semitones / 12.0)
}

/// Returns the name of a pitch class (0-11, wrapped).
pub fn pitch_class_name(pitch_class: u8) -> &'static str {
    NOTE_NAMES[(pitch_class % 12) as usize]
}

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Arguments
///
/// * `note` - MIDI note number (0-127)
///
/// # Returns
///
/// String representation like "C4" or "F#5"
///
/// # Examples
///
/// ```
/// use scorecraft::score::note_to_name;
///
/// let name = note_to_name(60); // Middle C
/// assert_eq!(name, "C4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    format!("{}{}", pitch_class_name(note), octave)
}

/// Converts a note name to MIDI note number.
///
/// # Arguments
///
/// * `name` - Note name like "C4" or "F#5"
///
/// # Returns
///
/// MIDI note number (0-127) or None if invalid
pub fn name_to_note(name: &str) -> Option<u8> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let octave_start = name.chars().position(|c| c.is_ascii_digit() || c == '-')?;

    let note_part = &name[..octave_start];
    let octave_part = &name[octave_start..];

    let note_index = NOTE_NAMES.iter().position(|&n| n == note_part)?;
    let octave: i16 = octave_part.parse().ok()?;

    // MIDI note = (octave + 1) * 12 + note_index
    let midi_note = (octave + 1) * 12 + note_index as i16;
    if (0..=127).contains(&midi_note) {
        Some(midi_note as u8)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_frequencies() {
        assert_eq!(pitch_to_frequency(69), 440.0);
        assert!((pitch_to_frequency(81) - 880.0).abs() < 1e-9);
        assert!((pitch_to_frequency(57) - 220.0).abs() < 1e-9);
    }

    #[test]
    fn test_middle_c_frequency() {
        assert!((pitch_to_frequency(60) - 261.625_565_300_6).abs() < 1e-6);
    }

    #[test]
    fn test_note_to_name() {
        assert_eq!(note_to_name(60), "C4");
        assert_eq!(note_to_name(69), "A4");
        assert_eq!(note_to_name(0), "C-1");
        assert_eq!(note_to_name(127), "G9");
    }

    #[test]
    fn test_name_to_note() {
        assert_eq!(name_to_note("C4"), Some(60));
        assert_eq!(name_to_note("A4"), Some(69));
        assert_eq!(name_to_note("C-1"), Some(0));
        assert_eq!(name_to_note("A9"), None);
        assert_eq!(name_to_note("H4"), None);
    }
}
