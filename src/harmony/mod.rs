//! Harmony generation.
//!
//! Produces an accompaniment layer of piano chords for a melody. The
//! analysis is deliberately simple: detect a key, walk the genre's first
//! progression and voice each chord as a short arpeggio. Generation runs
//! on a worker thread after a simulated processing delay and only one
//! request may be in flight at a time.

pub mod tables;

use crate::error::ValidationError;
use crate::score::{pitch_class_name, Note};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tables::{genre, resolve_numeral, scale, Genre, Scale, MAJOR};
use tracing::{debug, error, info, warn};

/// Default simulated processing time.
pub const DEFAULT_HARMONY_DELAY: Duration = Duration::from_millis(2000);

/// Seconds between chord onsets.
pub const CHORD_SPACING: f64 = 2.0;

/// Offset between successive tones of one chord.
pub const ARPEGGIO_STEP: f64 = 0.1;

/// Length of every harmony note.
pub const HARMONY_NOTE_DURATION: f64 = 1.8;

/// Velocity of every harmony note.
pub const HARMONY_VELOCITY: f32 = 0.4;

/// Instrument that voices the harmony layer.
pub const HARMONY_INSTRUMENT: &str = "piano";

/// Fewest chords generated, however short the melody.
pub const MIN_CHORDS: usize = 4;

/// Genre used when the requested one is unknown.
pub const DEFAULT_GENRE: &str = "pop";

/// Output of one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonyResult {
    /// Chord-tone notes, each tagged with its chord label and function.
    pub notes: Vec<Note>,
    /// One label per generated chord, in order.
    pub progression: Vec<String>,
    /// Detected key, e.g. "C" or "Am".
    pub key: String,
}

/// Picks the tonic pitch class whose scale best covers the melody.
///
/// Each in-scale note adds its duration to a candidate's score and notes on
/// the tonic itself count half again. Percussion notes are ignored. Ties
/// go to the lowest pitch class.
pub fn detect_key(melody: &[Note], scale: &Scale) -> u8 {
    let mut best = (0u8, f64::MIN);
    for tonic in 0..12u8 {
        let score: f64 = melody
            .iter()
            .filter(|n| !n.is_percussion())
            .map(|n| {
                let relative = (n.pitch + 12 - tonic) % 12;
                match relative {
                    0 => n.duration * 1.5,
                    r if scale.contains(r) => n.duration,
                    _ => 0.0,
                }
            })
            .sum();
        if score > best.1 {
            best = (tonic, score);
        }
    }
    best.0
}

/// Label for a chord rooted on `root` (pitch class): "C", "Am", "Bdim".
fn chord_label(root: u8, tones: [u8; 3]) -> String {
    let third = (tones[1] + 12 - tones[0]) % 12;
    let fifth = (tones[2] + 12 - tones[0]) % 12;
    let quality = match (third, fifth) {
        (3, 6) => "dim",
        (3, _) => "m",
        _ => "",
    };
    format!("{}{}", pitch_class_name(root), quality)
}

/// Pitches of a chord in octave 4, stacked upward from the root.
fn voice_chord(tonic: u8, tones: [u8; 3]) -> [u8; 3] {
    let mut pitches = [0u8; 3];
    let mut previous = 0u8;
    for (slot, tone) in pitches.iter_mut().zip(tones) {
        let mut pitch = 60 + (tonic + tone) % 12;
        while pitch <= previous {
            pitch += 12;
        }
        *slot = pitch;
        previous = pitch;
    }
    pitches
}

/// Runs the analysis synchronously.
///
/// # Arguments
///
/// * `melody` - Non-empty melody layer
/// * `genre_id` - Genre id; unknown ids use the pop tables
pub fn analyze(melody: &[Note], genre_id: &str) -> HarmonyResult {
    let genre: &Genre = genre(genre_id)
        .or_else(|| {
            warn!(genre = genre_id, "Unknown genre, using {}", DEFAULT_GENRE);
            genre(DEFAULT_GENRE)
        })
        .unwrap_or(&tables::GENRES[0]);
    let scale: &Scale = scale(genre.scale).unwrap_or(&MAJOR);

    let tonic = detect_key(melody, scale);
    let key = format!(
        "{}{}",
        pitch_class_name(tonic),
        if scale.is_minor() { "m" } else { "" }
    );

    let melody_end = melody.iter().map(Note::end).fold(0.0, f64::max);
    let chord_count = ((melody_end / CHORD_SPACING).ceil() as usize).max(MIN_CHORDS);
    let numerals = genre.progressions.first().copied().unwrap_or(&["I"]);

    let mut notes = Vec::with_capacity(chord_count * 3);
    let mut progression = Vec::with_capacity(chord_count);
    for i in 0..chord_count {
        let degree = resolve_numeral(scale, numerals[i % numerals.len()]);
        let root = (tonic + degree.tones[0]) % 12;
        let label = chord_label(root, degree.tones);
        let onset = i as f64 * CHORD_SPACING;

        for (j, pitch) in voice_chord(tonic, degree.tones).into_iter().enumerate() {
            notes.push(
                Note::new(
                    pitch,
                    onset + j as f64 * ARPEGGIO_STEP,
                    HARMONY_NOTE_DURATION,
                    HARMONY_VELOCITY,
                    HARMONY_INSTRUMENT,
                )
                .with_chord(label.clone(), degree.function),
            );
        }
        progression.push(label);
    }

    debug!(%key, chords = chord_count, genre = genre.id, "Harmony analyzed");
    HarmonyResult {
        notes,
        progression,
        key,
    }
}

/// A generation in flight.
#[derive(Debug)]
pub struct PendingHarmony {
    receiver: Receiver<HarmonyResult>,
}

impl PendingHarmony {
    /// Returns the result if the worker has finished.
    pub fn try_result(&self) -> Option<HarmonyResult> {
        self.receiver.try_recv().ok()
    }

    /// Blocks until the worker finishes.
    ///
    /// # Returns
    ///
    /// The result, or None if the worker died without producing one
    pub fn wait(self) -> Option<HarmonyResult> {
        self.receiver.recv().ok()
    }
}

/// Clears the busy flag when the worker is done, even if it panics.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs harmony generation off the caller's thread, one request at a time.
#[derive(Debug, Clone)]
pub struct HarmonyGenerator {
    busy: Arc<AtomicBool>,
    delay: Duration,
}

impl HarmonyGenerator {
    /// Creates a generator with the given simulated processing delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether a request is in flight.
    pub fn is_generating(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Starts generating harmony for `melody`.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if a generation is already running (the call is ignored),
    /// otherwise a handle to the pending result
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyMelody` if `melody` is empty
    pub fn request(
        &self,
        melody: &[Note],
        genre: &str,
    ) -> Result<Option<PendingHarmony>, ValidationError> {
        if melody.is_empty() {
            return Err(ValidationError::EmptyMelody);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Harmony generation already running, ignoring request");
            return Ok(None);
        }

        let (sender, receiver) = bounded(1);
        let melody = melody.to_vec();
        let genre = genre.to_string();
        let delay = self.delay;
        let guard = BusyGuard(Arc::clone(&self.busy));

        info!(notes = melody.len(), %genre, "Generating harmony");
        let spawned = thread::Builder::new()
            .name("harmony".to_string())
            .spawn(move || {
                thread::sleep(delay);
                let result = analyze(&melody, &genre);
                drop(guard);
                // The caller may have dropped its handle.
                let _ = sender.send(result);
            });

        if let Err(e) = spawned {
            // The closure (and its guard) was dropped, so the flag is clear.
            error!("Failed to spawn harmony worker: {}", e);
            return Ok(None);
        }
        Ok(Some(PendingHarmony { receiver }))
    }
}

impl Default for HarmonyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_HARMONY_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::HarmonicFunction;

    fn melody(pitches: &[u8]) -> Vec<Note> {
        pitches
            .iter()
            .enumerate()
            .map(|(i, p)| Note::new(*p, i as f64 * 0.5, 0.5, 0.7, "sine"))
            .collect()
    }

    #[test]
    fn test_detect_key() {
        // C major scale
        let c = melody(&[60, 62, 64, 65, 67, 69, 71, 72]);
        assert_eq!(detect_key(&c, &tables::MAJOR), 0);
        // G major scale (F#)
        let g = melody(&[67, 69, 71, 72, 74, 76, 78, 79]);
        assert_eq!(detect_key(&g, &tables::MAJOR), 7);
    }

    #[test]
    fn test_chord_labels() {
        assert_eq!(chord_label(0, [0, 4, 7]), "C");
        assert_eq!(chord_label(9, [9, 0, 4]), "Am");
        assert_eq!(chord_label(11, [11, 2, 5]), "Bdim");
    }

    #[test]
    fn test_voicing_ascends() {
        assert_eq!(voice_chord(0, [0, 4, 7]), [60, 64, 67]);
        assert_eq!(voice_chord(0, [5, 9, 0]), [65, 69, 72]);
    }

    #[test]
    fn test_analyze_pop_in_c() {
        let result = analyze(&melody(&[60, 64, 67, 72]), "pop");
        assert_eq!(result.key, "C");
        assert_eq!(result.progression, vec!["Am", "F", "C", "G"]);
        assert_eq!(result.notes.len(), 12);

        let first = &result.notes[0];
        assert_eq!(first.pitch, 69);
        assert_eq!(first.start, 0.0);
        assert_eq!(first.duration, HARMONY_NOTE_DURATION);
        assert_eq!(first.velocity, HARMONY_VELOCITY);
        assert_eq!(first.instrument, "piano");
        let tag = first.chord.as_ref().unwrap();
        assert_eq!(tag.label, "Am");
        assert_eq!(tag.function, HarmonicFunction::Tonic);

        assert!((result.notes[1].start - 0.1).abs() < 1e-12);
        assert_eq!(result.notes[3].start, 2.0);
    }

    #[test]
    fn test_long_melody_gets_more_chords() {
        let long = vec![Note::new(60, 0.0, 11.0, 0.7, "sine")];
        let result = analyze(&long, "jazz");
        assert_eq!(result.progression.len(), 6);
        assert!(result.notes.iter().map(Note::end).fold(0.0, f64::max) >= 11.0);
    }

    #[test]
    fn test_unknown_genre_uses_pop() {
        let m = melody(&[60, 64, 67]);
        assert_eq!(analyze(&m, "polka").progression, analyze(&m, "pop").progression);
    }

    #[test]
    fn test_empty_melody_rejected() {
        let generator = HarmonyGenerator::new(Duration::ZERO);
        assert_eq!(
            generator.request(&[], "pop").unwrap_err(),
            ValidationError::EmptyMelody
        );
        assert!(!generator.is_generating());
    }

    #[test]
    fn test_request_is_not_reentrant() {
        let generator = HarmonyGenerator::new(Duration::from_millis(200));
        let m = melody(&[60, 62]);
        let pending = generator.request(&m, "pop").unwrap().unwrap();
        assert!(generator.is_generating());
        assert!(generator.request(&m, "pop").unwrap().is_none());

        let result = pending.wait().unwrap();
        assert_eq!(result.progression.len(), 4);
        assert!(!generator.is_generating());
        assert!(generator.request(&m, "pop").unwrap().is_some());
    }
}
