//! Composition container.
//!
//! A composition holds two note layers: the user-authored melody and the
//! generated harmony. Playback and rendering always work on a snapshot, so
//! edits made while a pass is running never reach it.

use super::note::{Note, NoteId};
use crate::error::ScoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default tempo in beats per minute. Informational only.
pub const DEFAULT_TEMPO: u32 = 120;

/// Which layers a playback or render pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layers {
    /// Melody only ("play").
    Melody,
    /// Melody and harmony merged ("play all", export).
    All,
}

/// A complete two-layer composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    /// Tempo in beats per minute (display only).
    #[serde(default = "default_tempo")]
    pub tempo: u32,

    /// User-authored notes, in insertion order.
    #[serde(default)]
    melody: Vec<Note>,

    /// Generated harmony notes.
    #[serde(default)]
    harmony: Vec<Note>,

    /// Chord labels from the last harmony generation.
    #[serde(default)]
    progression: Vec<String>,
}

fn default_tempo() -> u32 {
    DEFAULT_TEMPO
}

impl Composition {
    /// Creates an empty composition at the default tempo.
    pub fn new() -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            melody: Vec::new(),
            harmony: Vec::new(),
            progression: Vec::new(),
        }
    }

    /// Adds a note to the melody layer.
    ///
    /// # Returns
    ///
    /// The NoteId of the added note
    pub fn add_note(&mut self, note: Note) -> NoteId {
        let id = note.id;
        self.melody.push(note);
        id
    }

    /// Adds a note after validating it.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::InvalidNote` if the note breaks an invariant
    pub fn try_add_note(&mut self, note: Note) -> Result<NoteId, ScoreError> {
        note.validate()?;
        Ok(self.add_note(note))
    }

    /// Removes a note by its ID from whichever layer holds it.
    ///
    /// # Returns
    ///
    /// The removed note, or None if not found
    pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
        for layer in [&mut self.melody, &mut self.harmony] {
            if let Some(pos) = layer.iter().position(|n| n.id == id) {
                return Some(layer.remove(pos));
            }
        }
        None
    }

    /// Returns a reference to a note by its ID.
    pub fn get_note(&self, id: NoteId) -> Option<&Note> {
        self.melody
            .iter()
            .chain(self.harmony.iter())
            .find(|n| n.id == id)
    }

    /// Returns a mutable reference to a note by its ID.
    pub fn get_note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.melody
            .iter_mut()
            .chain(self.harmony.iter_mut())
            .find(|n| n.id == id)
    }

    /// Returns the melody layer.
    pub fn melody(&self) -> &[Note] {
        &self.melody
    }

    /// Returns the harmony layer.
    pub fn harmony(&self) -> &[Note] {
        &self.harmony
    }

    /// Returns the chord progression labels.
    pub fn progression(&self) -> &[String] {
        &self.progression
    }

    /// Replaces the harmony layer and its progression labels.
    pub fn set_harmony(&mut self, notes: Vec<Note>, progression: Vec<String>) {
        self.harmony = notes;
        self.progression = progression;
    }

    /// Drops the generated harmony.
    pub fn clear_harmony(&mut self) {
        self.harmony.clear();
        self.progression.clear();
    }

    /// Removes every note from both layers.
    pub fn clear(&mut self) {
        self.melody.clear();
        self.clear_harmony();
    }

    /// Iterates the notes of the selected layers, melody first.
    pub fn notes(&self, layers: Layers) -> impl Iterator<Item = &Note> {
        let harmony: &[Note] = match layers {
            Layers::Melody => &[],
            Layers::All => &self.harmony,
        };
        self.melody.iter().chain(harmony.iter())
    }

    /// Returns the number of notes in the selected layers.
    pub fn note_count(&self, layers: Layers) -> usize {
        self.notes(layers).count()
    }

    /// Whether the selected layers contain no notes.
    pub fn is_empty(&self, layers: Layers) -> bool {
        self.notes(layers).next().is_none()
    }

    /// Returns the end of the last note in the selected layers, in seconds.
    /// Zero when the layers are empty.
    pub fn end_time(&self, layers: Layers) -> f64 {
        self.notes(layers).map(|n| n.end()).fold(0.0, f64::max)
    }

    /// Returns an owned copy for a playback or render pass.
    pub fn snapshot(&self) -> Composition {
        self.clone()
    }

    /// Checks every note in both layers.
    ///
    /// # Errors
    ///
    /// Returns the first invalid note's error
    pub fn validate(&self) -> Result<(), ScoreError> {
        self.notes(Layers::All).try_for_each(Note::validate)
    }

    /// Serializes the composition to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String, ScoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and validates a composition from JSON.
    ///
    /// # Errors
    ///
    /// Returns error if parsing fails or a note is invalid
    pub fn from_json(json: &str) -> Result<Self, ScoreError> {
        let composition: Composition = serde_json::from_str(json)?;
        composition.validate()?;
        composition.reserve_ids();
        Ok(composition)
    }

    /// Saves the composition to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ScoreError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Loads a composition from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if file reading, parsing or validation fails
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScoreError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Saves the composition in binary form.
    ///
    /// Uses bincode for compact serialization of numeric data.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn save_to_binary<P: AsRef<Path>>(&self, path: P) -> Result<(), ScoreError> {
        let data = bincode::serialize(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Loads a composition from binary form.
    ///
    /// # Errors
    ///
    /// Returns error if file reading, decoding or validation fails
    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<Self, ScoreError> {
        let data = fs::read(path)?;
        let composition: Composition = bincode::deserialize(&data)?;
        composition.validate()?;
        composition.reserve_ids();
        Ok(composition)
    }

    fn reserve_ids(&self) {
        if let Some(max) = self.notes(Layers::All).map(|n| n.id).max_by_key(NoteId::as_u64) {
            NoteId::reserve(max);
        }
    }
}

impl Default for Composition {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::HarmonicFunction;

    fn sample() -> Composition {
        let mut composition = Composition::new();
        composition.add_note(Note::new(60, 0.0, 1.0, 0.7, "sine"));
        composition.add_note(Note::new(64, 1.0, 2.0, 0.7, "piano"));
        composition.set_harmony(
            vec![Note::new(48, 0.0, 5.5, 0.4, "piano").with_chord("C", HarmonicFunction::Tonic)],
            vec!["C".to_string()],
        );
        composition
    }

    #[test]
    fn test_composition_creation() {
        let composition = Composition::new();
        assert_eq!(composition.tempo, 120);
        assert!(composition.is_empty(Layers::All));
        assert_eq!(composition.end_time(Layers::All), 0.0);
    }

    #[test]
    fn test_layers() {
        let composition = sample();
        assert_eq!(composition.note_count(Layers::Melody), 2);
        assert_eq!(composition.note_count(Layers::All), 3);
        assert_eq!(composition.end_time(Layers::Melody), 3.0);
        assert_eq!(composition.end_time(Layers::All), 5.5);
    }

    #[test]
    fn test_remove_from_either_layer() {
        let mut composition = sample();
        let harmony_id = composition.harmony()[0].id;
        assert!(composition.remove_note(harmony_id).is_some());
        assert!(composition.harmony().is_empty());
        assert!(composition.remove_note(harmony_id).is_none());
    }

    #[test]
    fn test_try_add_and_edit() {
        let mut composition = Composition::new();
        assert!(composition
            .try_add_note(Note::new(60, 0.0, 0.0, 0.7, "sine"))
            .is_err());
        assert!(composition.is_empty(Layers::Melody));

        let id = composition
            .try_add_note(Note::new(60, 1.0, 1.0, 0.7, "sine"))
            .unwrap();
        let note = composition.get_note_mut(id).unwrap();
        note.shift(-2.0);
        assert_eq!(note.start, 0.0);
        note.shift(0.5);
        assert_eq!(composition.get_note(id).unwrap().start, 0.5);
    }

    #[test]
    fn test_clear() {
        let mut composition = sample();
        composition.clear();
        assert!(composition.is_empty(Layers::All));
        assert!(composition.progression().is_empty());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut composition = sample();
        let snapshot = composition.snapshot();
        composition.clear();
        assert_eq!(snapshot.note_count(Layers::All), 3);
    }

    #[test]
    fn test_json_serialization() {
        let composition = sample();
        let json = composition.to_json().unwrap();
        let loaded = Composition::from_json(&json).unwrap();
        assert_eq!(loaded, composition);
    }

    #[test]
    fn test_from_json_validates_notes() {
        let json = r#"{"melody":[{"id":1,"pitch":60,"start":0.0,"duration":0.0,"velocity":0.5,"instrument":"sine"}]}"#;
        assert!(matches!(
            Composition::from_json(json),
            Err(ScoreError::InvalidNote(_))
        ));
    }

    #[test]
    fn test_loaded_ids_are_not_reissued() {
        let json = r#"{"melody":[{"id":5000000,"pitch":60,"start":0.0,"duration":1.0,"velocity":0.5,"instrument":"sine"}]}"#;
        let mut composition = Composition::from_json(json).unwrap();
        let loaded = composition.melody()[0].id;

        let added = composition.add_note(Note::new(72, 1.0, 1.0, 0.7, "sine"));
        assert!(added.as_u64() > loaded.as_u64());
        assert_eq!(composition.remove_note(added).unwrap().pitch, 72);
        assert_eq!(composition.get_note(loaded).unwrap().pitch, 60);
    }

    #[test]
    fn test_file_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let composition = sample();

        let json_path = dir.path().join("song.json");
        composition.save_to_file(&json_path).unwrap();
        assert_eq!(Composition::load_from_file(&json_path).unwrap(), composition);

        let bin_path = dir.path().join("song.bin");
        composition.save_to_binary(&bin_path).unwrap();
        assert_eq!(
            Composition::load_from_binary(&bin_path).unwrap(),
            composition
        );
    }
}
