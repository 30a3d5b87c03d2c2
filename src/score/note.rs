//! Note representation.
//!
//! A note is a single timed event: pitch, start, duration and velocity in
//! seconds and unit-range dynamics, plus the instrument that should voice it.

use crate::error::ScoreError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique note IDs.
static NOTE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Duration given to percussion notes when they are placed.
pub const DRUM_NOTE_DURATION: f64 = 0.2;

/// Unique identifier for a note within a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId(u64);

impl NoteId {
    /// Generates a new unique note ID.
    ///
    /// Thread-safe: uses atomic increment internally.
    pub fn new() -> Self {
        Self(NOTE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Moves the counter past `id` so ids loaded from a file are never
    /// handed out again.
    pub(crate) fn reserve(id: NoteId) {
        NOTE_ID_COUNTER.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

/// Harmonic function of a generated chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarmonicFunction {
    #[serde(rename = "T")]
    Tonic,
    #[serde(rename = "S")]
    Subdominant,
    #[serde(rename = "D")]
    Dominant,
}

/// Chord label carried by harmony-layer notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordTag {
    /// Display label, e.g. "Am".
    pub label: String,
    /// Tonic / subdominant / dominant.
    pub function: HarmonicFunction,
}

/// A single timed note event.
///
/// Timing is in seconds. The `id` field allows tracking notes across edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier for this note instance.
    pub id: NoteId,

    /// MIDI note number (0-127). 60 = Middle C (C4).
    pub pitch: u8,

    /// Start time in seconds from the beginning of the score.
    pub start: f64,

    /// Duration in seconds. Always positive.
    pub duration: f64,

    /// Note velocity (0.0-1.0).
    pub velocity: f32,

    /// Instrument id from the instrument catalog.
    pub instrument: String,

    /// Drum voice id for percussion notes.
    #[serde(default)]
    pub drum: Option<String>,

    /// Chord label, present on harmony-layer notes only.
    #[serde(default)]
    pub chord: Option<ChordTag>,
}

impl Note {
    /// Creates a new note, clamping out-of-range fields.
    ///
    /// # Arguments
    ///
    /// * `pitch` - MIDI note number (clamped to 0-127)
    /// * `start` - Start in seconds (clamped to >= 0)
    /// * `duration` - Duration in seconds
    /// * `velocity` - Velocity (clamped to 0.0-1.0)
    /// * `instrument` - Instrument id
    ///
    /// # Examples
    ///
    /// ```
    /// use scorecraft::score::Note;
    ///
    /// // Middle C for one second on the sine synth
    /// let note = Note::new(60, 0.0, 1.0, 0.7, "sine");
    /// assert_eq!(note.end(), 1.0);
    /// ```
    pub fn new(
        pitch: u8,
        start: f64,
        duration: f64,
        velocity: f32,
        instrument: impl Into<String>,
    ) -> Self {
        Self {
            id: NoteId::new(),
            pitch: pitch.min(127),
            start: start.max(0.0),
            duration,
            velocity: velocity.clamp(0.0, 1.0),
            instrument: instrument.into(),
            drum: None,
            chord: None,
        }
    }

    /// Creates a note after validating every field.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::InvalidNote` if any invariant is violated
    pub fn try_new(
        pitch: u8,
        start: f64,
        duration: f64,
        velocity: f32,
        instrument: impl Into<String>,
    ) -> Result<Self, ScoreError> {
        let note = Self {
            id: NoteId::new(),
            pitch,
            start,
            duration,
            velocity,
            instrument: instrument.into(),
            drum: None,
            chord: None,
        };
        note.validate()?;
        Ok(note)
    }

    /// Creates a percussion note for a drum voice.
    ///
    /// # Arguments
    ///
    /// * `drum` - Drum voice id (e.g. "kick")
    /// * `pitch` - The drum's pitch code
    /// * `start` - Start in seconds
    /// * `velocity` - Velocity (0.0-1.0)
    pub fn drum(drum: impl Into<String>, pitch: u8, start: f64, velocity: f32) -> Self {
        let mut note = Self::new(pitch, start, DRUM_NOTE_DURATION, velocity, "drums");
        note.drum = Some(drum.into());
        note
    }

    /// Attaches a chord label, builder style.
    pub fn with_chord(mut self, label: impl Into<String>, function: HarmonicFunction) -> Self {
        self.chord = Some(ChordTag {
            label: label.into(),
            function,
        });
        self
    }

    /// Checks the note invariants.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::InvalidNote` describing the first violation
    pub fn validate(&self) -> Result<(), ScoreError> {
        if self.pitch > 127 {
            return Err(ScoreError::InvalidNote(format!(
                "pitch {} out of range 0-127",
                self.pitch
            )));
        }
        if !self.start.is_finite() || self.start < 0.0 {
            return Err(ScoreError::InvalidNote(format!(
                "start {} must be finite and >= 0",
                self.start
            )));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(ScoreError::InvalidNote(format!(
                "duration {} must be finite and > 0",
                self.duration
            )));
        }
        if !(0.0..=1.0).contains(&self.velocity) {
            return Err(ScoreError::InvalidNote(format!(
                "velocity {} out of range 0-1",
                self.velocity
            )));
        }
        Ok(())
    }

    /// Returns the end time of this note (start + duration).
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Checks if this note overlaps with a given time range.
    ///
    /// # Arguments
    ///
    /// * `start` - Start of the range (inclusive)
    /// * `end` - End of the range (exclusive)
    pub fn overlaps_range(&self, start: f64, end: f64) -> bool {
        self.start < end && self.end() > start
    }

    /// Checks if this note is sounding at a specific time.
    pub fn is_active_at(&self, time: f64) -> bool {
        time >= self.start && time < self.end()
    }

    /// Whether this note is voiced by a drum.
    pub fn is_percussion(&self) -> bool {
        self.drum.is_some()
    }

    /// Creates a copy of this note with a new unique ID.
    /// Useful for copy/paste operations.
    pub fn duplicate(&self) -> Self {
        Self {
            id: NoteId::new(),
            ..self.clone()
        }
    }

    /// Transposes the note by a number of semitones.
    ///
    /// # Returns
    ///
    /// true if the transposition was successful (note stays in 0-127 range)
    pub fn transpose(&mut self, semitones: i8) -> bool {
        let new_pitch = self.pitch as i16 + semitones as i16;
        if (0..=127).contains(&new_pitch) {
            self.pitch = new_pitch as u8;
            true
        } else {
            false
        }
    }

    /// Moves the note by a number of seconds, never before zero.
    pub fn shift(&mut self, seconds: f64) {
        self.start = (self.start + seconds).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_creation() {
        let note = Note::new(60, 0.5, 1.0, 0.7, "sine");
        assert_eq!(note.pitch, 60);
        assert_eq!(note.start, 0.5);
        assert_eq!(note.duration, 1.0);
        assert_eq!(note.end(), 1.5);
        assert!(note.drum.is_none());
    }

    #[test]
    fn test_note_clamping() {
        let note = Note::new(200, -1.0, 1.0, 1.5, "sine");
        assert_eq!(note.pitch, 127);
        assert_eq!(note.start, 0.0);
        assert_eq!(note.velocity, 1.0);
    }

    #[test]
    fn test_try_new_rejects_bad_fields() {
        assert!(Note::try_new(60, 0.0, 0.0, 0.5, "sine").is_err());
        assert!(Note::try_new(60, 0.0, -1.0, 0.5, "sine").is_err());
        assert!(Note::try_new(128, 0.0, 1.0, 0.5, "sine").is_err());
        assert!(Note::try_new(60, -0.1, 1.0, 0.5, "sine").is_err());
        assert!(Note::try_new(60, 0.0, 1.0, 1.1, "sine").is_err());
        assert!(Note::try_new(60, 0.0, f64::NAN, 0.5, "sine").is_err());
        assert!(Note::try_new(60, 0.0, 1.0, 0.5, "sine").is_ok());
    }

    #[test]
    fn test_drum_note() {
        let note = Note::drum("snare", 38, 1.0, 0.7);
        assert!(note.is_percussion());
        assert_eq!(note.instrument, "drums");
        assert_eq!(note.duration, DRUM_NOTE_DURATION);
    }

    #[test]
    fn test_note_overlap() {
        let note = Note::new(60, 1.0, 2.0, 0.7, "sine"); // 1-3
        assert!(note.overlaps_range(0.0, 1.5));
        assert!(note.overlaps_range(2.0, 4.0));
        assert!(!note.overlaps_range(0.0, 1.0));
        assert!(!note.overlaps_range(3.0, 4.0));
    }

    #[test]
    fn test_note_active() {
        let note = Note::new(60, 1.0, 2.0, 0.7, "sine");
        assert!(!note.is_active_at(0.99));
        assert!(note.is_active_at(1.0));
        assert!(note.is_active_at(2.5));
        assert!(!note.is_active_at(3.0));
    }

    #[test]
    fn test_transpose() {
        let mut note = Note::new(60, 0.0, 1.0, 0.7, "sine");
        assert!(note.transpose(12));
        assert_eq!(note.pitch, 72);

        let mut note = Note::new(120, 0.0, 1.0, 0.7, "sine");
        assert!(!note.transpose(12));
        assert_eq!(note.pitch, 120);
    }

    #[test]
    fn test_duplicate_gets_new_id() {
        let note = Note::new(60, 0.0, 1.0, 0.7, "piano").with_chord("C", HarmonicFunction::Tonic);
        let copy = note.duplicate();
        assert_ne!(note.id, copy.id);
        assert_eq!(copy.chord, note.chord);
    }

    #[test]
    fn test_function_serializes_as_letter() {
        let json = serde_json::to_string(&HarmonicFunction::Dominant).unwrap();
        assert_eq!(json, "\"D\"");
    }
}
