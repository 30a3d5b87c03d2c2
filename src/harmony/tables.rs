//! Scale, chord and genre tables that drive harmony generation.

use crate::score::HarmonicFunction::{self, Dominant as D, Subdominant as S, Tonic as T};

/// A diatonic chord, as a roman numeral over scale-relative pitch classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordDegree {
    pub numeral: &'static str,
    /// Root, third and fifth as semitones above the tonic (mod 12).
    pub tones: [u8; 3],
    pub function: HarmonicFunction,
}

const fn chord(numeral: &'static str, tones: [u8; 3], function: HarmonicFunction) -> ChordDegree {
    ChordDegree {
        numeral,
        tones,
        function,
    }
}

/// A seven-note scale and its diatonic triads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    pub id: &'static str,
    pub name: &'static str,
    pub intervals: [u8; 7],
    pub chords: [ChordDegree; 7],
}

impl Scale {
    /// Whether `pitch_class` (relative to the tonic) lies in the scale.
    pub fn contains(&self, pitch_class: u8) -> bool {
        self.intervals.contains(&(pitch_class % 12))
    }

    /// Whether the tonic triad is minor.
    pub fn is_minor(&self) -> bool {
        self.intervals[2] == 3
    }
}

pub const MAJOR: Scale = Scale {
    id: "major",
    name: "Major",
    intervals: [0, 2, 4, 5, 7, 9, 11],
    chords: [
        chord("I", [0, 4, 7], T),
        chord("ii", [2, 5, 9], S),
        chord("iii", [4, 7, 11], T),
        chord("IV", [5, 9, 0], S),
        chord("V", [7, 11, 2], D),
        chord("vi", [9, 0, 4], T),
        chord("vii°", [11, 2, 5], D),
    ],
};

pub const MINOR: Scale = Scale {
    id: "minor",
    name: "Natural Minor",
    intervals: [0, 2, 3, 5, 7, 8, 10],
    chords: [
        chord("i", [0, 3, 7], T),
        chord("ii°", [2, 5, 8], S),
        chord("III", [3, 7, 10], T),
        chord("iv", [5, 8, 0], S),
        chord("v", [7, 10, 2], D),
        chord("VI", [8, 0, 3], S),
        chord("VII", [10, 2, 5], D),
    ],
};

pub const DORIAN: Scale = Scale {
    id: "dorian",
    name: "Dorian",
    intervals: [0, 2, 3, 5, 7, 9, 10],
    chords: [
        chord("i", [0, 3, 7], T),
        chord("ii", [2, 5, 9], S),
        chord("III", [3, 7, 10], T),
        chord("IV", [5, 9, 0], S),
        chord("v", [7, 10, 2], D),
        chord("vi°", [9, 0, 3], T),
        chord("VII", [10, 2, 5], D),
    ],
};

pub const SCALES: &[Scale] = &[MAJOR, MINOR, DORIAN];

/// A musical style and the scale it harmonizes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Genre {
    pub id: &'static str,
    pub name: &'static str,
    pub scale: &'static str,
    /// Candidate progressions, most typical first.
    pub progressions: &'static [&'static [&'static str]],
}

const POP: &[&[&str]] = &[
    &["vi", "IV", "I", "V"],
    &["I", "V", "vi", "IV"],
    &["I", "vi", "ii", "V"],
    &["vi", "ii", "V", "I"],
    &["I", "vi", "IV", "V"],
];

const JAZZ: &[&[&str]] = &[
    &["ii", "V", "I", "vi"],
    &["I", "vi", "ii", "V"],
    &["iii", "vi", "ii", "V"],
    &["I", "VI7", "ii", "V"],
    &["ii", "V", "iii", "vi"],
    &["I", "I7", "IV", "iv"],
];

const ROCK: &[&[&str]] = &[
    &["I", "VII", "IV", "I"],
    &["vi", "IV", "I", "V"],
    &["I", "V", "IV", "I"],
    &["I", "bVII", "IV", "I"],
    &["vi", "V", "IV", "V"],
];

const CLASSICAL: &[&[&str]] = &[
    &["I", "IV", "V", "I"],
    &["I", "ii", "V", "I"],
    &["vi", "ii", "V", "I"],
    &["I", "V", "vi", "IV"],
    &["ii", "V7", "I", "vi"],
];

const BLUES: &[&[&str]] = &[
    &["I7", "I7", "I7", "I7"],
    &["IV7", "IV7", "I7", "I7"],
    &["V7", "IV7", "I7", "V7"],
];

const ELECTRONIC: &[&[&str]] = &[
    &["i", "VII", "VI", "VII"],
    &["i", "v", "VI", "IV"],
    &["i", "III", "VII", "VI"],
    &["i", "iv", "VII", "III"],
];

const AMBIENT: &[&[&str]] = &[
    &["i", "VII", "VI", "VII"],
    &["i", "III", "VI", "IV"],
    &["i", "v", "IV", "VII"],
    &["i", "ii°", "V", "i"],
];

pub const GENRES: &[Genre] = &[
    Genre {
        id: "pop",
        name: "Pop",
        scale: "major",
        progressions: POP,
    },
    Genre {
        id: "rock",
        name: "Rock",
        scale: "major",
        progressions: ROCK,
    },
    Genre {
        id: "jazz",
        name: "Jazz",
        scale: "major",
        progressions: JAZZ,
    },
    Genre {
        id: "classical",
        name: "Classical",
        scale: "major",
        progressions: CLASSICAL,
    },
    Genre {
        id: "electronic",
        name: "Electronic",
        scale: "minor",
        progressions: ELECTRONIC,
    },
    Genre {
        id: "ambient",
        name: "Ambient",
        scale: "dorian",
        progressions: AMBIENT,
    },
    Genre {
        id: "blues",
        name: "Blues",
        scale: "minor",
        progressions: BLUES,
    },
    // No progressions of its own; borrows pop's.
    Genre {
        id: "reggae",
        name: "Reggae",
        scale: "major",
        progressions: POP,
    },
];

/// Looks up a scale by id.
pub fn scale(id: &str) -> Option<&'static Scale> {
    SCALES.iter().find(|s| s.id == id)
}

/// Looks up a genre by id.
pub fn genre(id: &str) -> Option<&'static Genre> {
    GENRES.iter().find(|g| g.id == id)
}

/// Numeral with accidentals, sevenths and diminished marks removed,
/// lowercased.
fn loose(numeral: &str) -> String {
    numeral
        .chars()
        .filter(|c| !matches!(c, 'b' | '#' | '7' | '°'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Finds the chord for a roman numeral in `scale`.
///
/// Tries an exact match, then a loose one ignoring case, accidentals,
/// sevenths and diminished marks, then falls back to the tonic chord.
pub fn resolve_numeral<'a>(scale: &'a Scale, numeral: &str) -> &'a ChordDegree {
    if let Some(chord) = scale.chords.iter().find(|c| c.numeral == numeral) {
        return chord;
    }
    let wanted = loose(numeral);
    scale
        .chords
        .iter()
        .find(|c| loose(c.numeral) == wanted)
        .unwrap_or(&scale.chords[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genre_scales_exist() {
        for genre in GENRES {
            assert!(scale(genre.scale).is_some(), "{}", genre.id);
            assert!(!genre.progressions.is_empty());
        }
        assert_eq!(genre("ambient").unwrap().scale, "dorian");
        assert!(genre("polka").is_none());
    }

    #[test]
    fn test_chord_tones_are_in_scale() {
        for scale in SCALES {
            for chord in &scale.chords {
                for tone in chord.tones {
                    assert!(scale.contains(tone), "{} {}", scale.id, chord.numeral);
                }
            }
        }
    }

    #[test]
    fn test_resolve_exact_and_loose() {
        assert_eq!(resolve_numeral(&MAJOR, "IV").tones, [5, 9, 0]);
        assert_eq!(resolve_numeral(&MAJOR, "V7").numeral, "V");
        assert_eq!(resolve_numeral(&MAJOR, "bVII").numeral, "vii°");
        assert_eq!(resolve_numeral(&MINOR, "IV").numeral, "iv");
        assert_eq!(resolve_numeral(&MAJOR, "xyz").numeral, "I");
    }

    #[test]
    fn test_resolved_chord_outlives_numeral() {
        let numeral = String::from("V7");
        let chord = resolve_numeral(&MAJOR, &numeral);
        drop(numeral);
        assert_eq!(chord.numeral, "V");
        assert_eq!(chord.tones, [7, 11, 2]);
    }

    #[test]
    fn test_minor_detection() {
        assert!(!MAJOR.is_minor());
        assert!(MINOR.is_minor());
        assert!(DORIAN.is_minor());
    }
}
