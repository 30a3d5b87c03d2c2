//! Editing session state.
//!
//! A [`Session`] is the explicit context handed to the engine, transport and
//! exporter: the composition being edited, the user's selections, master
//! volume, genre, detected key, playback progress and the last status
//! message. Failures of session operations are reported through the status
//! message and never modify the composition.

use crate::audio::export::{self, AudioBlob, ExportFormat};
use crate::audio::voice::{RenderContext, DEFAULT_MASTER_VOLUME};
use crate::error::ScoreError;
use crate::harmony::{HarmonyGenerator, HarmonyResult, PendingHarmony, DEFAULT_GENRE};
use crate::score::{drum_voice, instrument, Composition, Note, NoteId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Velocity given to notes placed through the session.
pub const DEFAULT_VELOCITY: f32 = 0.7;

/// User-adjustable defaults, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Master volume (0.0-1.0).
    pub master_volume: f32,
    /// Genre used for harmony and export file names.
    pub genre: String,
    /// Instrument id for newly placed notes.
    pub instrument: String,
    /// Drum voice id used when the instrument is "drums".
    pub drum: String,
    /// Default export format.
    pub export_format: ExportFormat,
    /// Simulated harmony processing time in milliseconds.
    pub harmony_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            master_volume: DEFAULT_MASTER_VOLUME,
            genre: DEFAULT_GENRE.to_string(),
            instrument: "sine".to_string(),
            drum: "kick".to_string(),
            export_format: ExportFormat::Wav,
            harmony_delay_ms: 2000,
        }
    }
}

impl SessionConfig {
    /// Loads a config file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScoreError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Saves the config as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or writing fails
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ScoreError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// One user's editing session.
#[derive(Debug)]
pub struct Session {
    composition: Composition,
    config: SessionConfig,
    detected_key: Option<String>,
    status: Option<String>,
    progress: f64,
    harmony: HarmonyGenerator,
    pending_harmony: Option<PendingHarmony>,
}

impl Session {
    /// Creates a session with an empty composition.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_composition(Composition::new(), config)
    }

    /// Creates a session around an existing composition.
    pub fn with_composition(composition: Composition, mut config: SessionConfig) -> Self {
        config.master_volume = config.master_volume.clamp(0.0, 1.0);
        let harmony = HarmonyGenerator::new(Duration::from_millis(config.harmony_delay_ms));
        Self {
            composition,
            config,
            detected_key: None,
            status: None,
            progress: 0.0,
            harmony,
            pending_harmony: None,
        }
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn composition_mut(&mut self) -> &mut Composition {
        &mut self.composition
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn master_volume(&self) -> f32 {
        self.config.master_volume
    }

    /// Sets the master volume, clamped to 0.0-1.0. Voices already sounding
    /// keep the volume they were built with.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.config.master_volume = volume.clamp(0.0, 1.0);
    }

    /// Snapshot of the values voices read at construction.
    pub fn render_context(&self) -> RenderContext {
        RenderContext::new(self.config.master_volume)
    }

    pub fn genre(&self) -> &str {
        &self.config.genre
    }

    pub fn set_genre(&mut self, genre: impl Into<String>) {
        self.config.genre = genre.into();
    }

    /// Informational tempo in BPM.
    pub fn tempo(&self) -> u32 {
        self.composition.tempo
    }

    pub fn set_tempo(&mut self, tempo: u32) {
        self.composition.tempo = tempo;
    }

    pub fn selected_instrument(&self) -> &str {
        &self.config.instrument
    }

    /// Selects the instrument for new notes.
    ///
    /// # Returns
    ///
    /// false (selection unchanged, status set) if the id is unknown
    pub fn select_instrument(&mut self, id: &str) -> bool {
        if instrument(id).is_none() {
            self.set_status(format!("Unknown instrument: {}", id));
            return false;
        }
        self.config.instrument = id.to_string();
        true
    }

    pub fn selected_drum(&self) -> &str {
        &self.config.drum
    }

    /// Selects the drum voice used when the instrument is "drums".
    ///
    /// # Returns
    ///
    /// false (selection unchanged, status set) if the id is unknown
    pub fn select_drum(&mut self, id: &str) -> bool {
        if drum_voice(id).is_none() {
            self.set_status(format!("Unknown drum: {}", id));
            return false;
        }
        self.config.drum = id.to_string();
        true
    }

    /// Places a note with the selected instrument on the melody layer.
    ///
    /// With drums selected the note takes the selected drum's pitch and the
    /// fixed drum note length, ignoring `pitch` and `duration`.
    pub fn place_note(&mut self, pitch: u8, start: f64, duration: f64) -> NoteId {
        let note = match drum_voice(&self.config.drum) {
            Some(drum) if self.config.instrument == "drums" => {
                Note::drum(drum.id, drum.pitch, start, DEFAULT_VELOCITY)
            }
            _ => Note::new(
                pitch,
                start,
                duration,
                DEFAULT_VELOCITY,
                self.config.instrument.clone(),
            ),
        };
        self.composition.add_note(note)
    }

    /// Key found by the last harmony generation.
    pub fn detected_key(&self) -> Option<&str> {
        self.detected_key.as_deref()
    }

    /// Last recoverable error or notice for display.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Playback progress, 0-100.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn set_progress(&mut self, progress: f64) {
        self.progress = progress.clamp(0.0, 100.0);
    }

    /// Clears the composition and every derived value.
    pub fn reset(&mut self) {
        self.composition.clear();
        self.detected_key = None;
        self.status = None;
        self.progress = 0.0;
        self.pending_harmony = None;
        info!("Session reset");
    }

    /// Renders and encodes the composition.
    ///
    /// # Returns
    ///
    /// The encoded blob, or None with the status message set on failure
    pub fn export(&mut self, format: ExportFormat) -> Option<AudioBlob> {
        match export::export(self, format, Utc::now()) {
            Ok(blob) => {
                self.clear_status();
                Some(blob)
            }
            Err(e) => {
                error!("Export failed: {}", e);
                self.set_status(format!("Export failed: {}", e));
                None
            }
        }
    }

    /// Starts harmony generation for the melody layer.
    ///
    /// # Returns
    ///
    /// true if a generation was started; false if the melody is empty
    /// (status set) or one is already running
    pub fn generate_harmony(&mut self) -> bool {
        let genre = self.config.genre.clone();
        match self.harmony.request(self.composition.melody(), &genre) {
            Ok(Some(pending)) => {
                debug!(genre = %genre, delay = ?self.harmony.delay(), "Harmony requested");
                self.pending_harmony = Some(pending);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Harmony rejected: {}", e);
                self.set_status(e.to_string());
                false
            }
        }
    }

    /// Whether a harmony generation is in flight.
    pub fn is_generating(&self) -> bool {
        self.harmony.is_generating()
    }

    /// Applies a finished harmony result, if there is one.
    ///
    /// # Returns
    ///
    /// true if the harmony layer was updated
    pub fn poll_harmony(&mut self) -> bool {
        let result = self.pending_harmony.as_ref().and_then(PendingHarmony::try_result);
        match result {
            Some(result) => {
                self.pending_harmony = None;
                self.apply_harmony(result);
                true
            }
            None => false,
        }
    }

    /// Blocks until the pending harmony finishes and applies it.
    ///
    /// # Returns
    ///
    /// true if the harmony layer was updated
    pub fn wait_for_harmony(&mut self) -> bool {
        match self.pending_harmony.take().and_then(PendingHarmony::wait) {
            Some(result) => {
                self.apply_harmony(result);
                true
            }
            None => false,
        }
    }

    /// Replaces the harmony layer with a generation result.
    pub fn apply_harmony(&mut self, result: HarmonyResult) {
        info!(
            key = %result.key,
            chords = result.progression.len(),
            "Harmony applied"
        );
        self.composition.set_harmony(result.notes, result.progression);
        self.detected_key = Some(result.key);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::score::Layers;

    fn fast_session() -> Session {
        Session::new(SessionConfig {
            harmony_delay_ms: 0,
            ..SessionConfig::default()
        })
    }

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.master_volume, 0.7);
        assert_eq!(config.genre, "pop");
        assert_eq!(config.export_format, ExportFormat::Wav);
    }

    #[test]
    fn test_config_partial_json() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"genre":"jazz","export_format":"mp3"}"#).unwrap();
        assert_eq!(config.genre, "jazz");
        assert_eq!(config.export_format, ExportFormat::StubMp3);
        assert_eq!(config.master_volume, 0.7);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = SessionConfig {
            master_volume: 0.3,
            drum: "snare".to_string(),
            ..SessionConfig::default()
        };
        config.save_to_file(&path).unwrap();
        assert_eq!(SessionConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut session = Session::default();
        session.set_master_volume(3.0);
        assert_eq!(session.master_volume(), 1.0);
        assert_eq!(session.render_context().master_volume, 1.0);
    }

    #[test]
    fn test_place_note_uses_selection() {
        let mut session = Session::default();
        let id = session.place_note(60, 0.0, 1.0);
        assert_eq!(session.composition().get_note(id).unwrap().instrument, "sine");

        assert!(session.select_instrument("drums"));
        assert!(session.select_drum("snare"));
        let id = session.place_note(70, 1.0, 1.0);
        let note = session.composition().get_note(id).unwrap();
        assert_eq!(note.pitch, 38);
        assert_eq!(note.drum.as_deref(), Some("snare"));

        assert!(!session.select_instrument("theremin"));
        assert_eq!(session.selected_instrument(), "drums");
        assert!(session.status().is_some());
    }

    #[test]
    fn test_export_empty_sets_status() {
        let mut session = Session::default();
        assert!(session.export(ExportFormat::Wav).is_none());
        let status = session.status().unwrap();
        assert!(status.contains(&ValidationError::EmptyComposition.to_string()));
    }

    #[test]
    fn test_harmony_on_empty_melody() {
        let mut session = fast_session();
        assert!(!session.generate_harmony());
        assert!(session.composition().harmony().is_empty());
        assert!(session.composition().progression().is_empty());
        assert!(session.status().is_some());
    }

    #[test]
    fn test_harmony_applied() {
        let mut session = fast_session();
        session.place_note(60, 0.0, 1.0);
        session.place_note(64, 1.0, 1.0);
        assert!(session.generate_harmony());
        assert!(session.wait_for_harmony());
        assert_eq!(session.composition().progression().len(), 4);
        assert_eq!(session.detected_key(), Some("C"));
        assert_eq!(session.composition().note_count(Layers::All), 14);
    }

    #[test]
    fn test_harmony_polled() {
        let mut session = Session::new(SessionConfig {
            harmony_delay_ms: 200,
            ..SessionConfig::default()
        });
        session.place_note(60, 0.0, 1.0);
        session.place_note(64, 1.0, 1.0);

        assert!(session.generate_harmony());
        assert!(!session.poll_harmony());
        assert!(session.composition().harmony().is_empty());

        let started = std::time::Instant::now();
        while !session.poll_harmony() {
            assert!(started.elapsed() < std::time::Duration::from_secs(5));
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(session.composition().progression(), ["Am", "F", "C", "G"]);
        assert_eq!(session.composition().harmony().len(), 12);
        assert_eq!(session.detected_key(), Some("C"));
        assert!(!session.poll_harmony());
    }

    #[test]
    fn test_reset() {
        let mut session = fast_session();
        session.place_note(60, 0.0, 1.0);
        session.set_progress(50.0);
        session.set_status("x");
        session.reset();
        assert!(session.composition().is_empty(Layers::All));
        assert_eq!(session.progress(), 0.0);
        assert!(session.status().is_none());
        assert!(session.detected_key().is_none());
    }
}
