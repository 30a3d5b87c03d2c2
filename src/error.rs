//! Error types for synthesis, playback and export.
//!
//! Per-note failures ([`SynthesisError`]) are always recoverable: the note is
//! skipped and the rest of the score keeps going. Everything else is surfaced
//! to the caller as a status message without touching the composition.

use thiserror::Error;

/// The audio output backend could not be brought up.
#[derive(Debug, Error)]
pub enum InitializationError {
    /// No usable output device or stream.
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),
}

/// A single voice could not be constructed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SynthesisError {
    /// Sample rate of zero.
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    /// Frequency that is not finite or not positive.
    #[error("invalid frequency: {0} Hz")]
    InvalidFrequency(f64),

    /// Duration that is not finite or not positive.
    #[error("invalid duration: {0} seconds")]
    InvalidDuration(f64),

    /// Start offset that is negative or not finite.
    #[error("invalid start offset: {0} seconds")]
    InvalidStart(f64),
}

/// Rendering or encoding a composition failed.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The WAV writer rejected the data.
    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),

    /// Writing the exported file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested export format is not supported.
    #[error("unknown export format: {0} (expected wav or mp3)")]
    UnknownFormat(String),

    /// The rendered buffer is too large for the container format.
    #[error("rendered audio too long for container: {frames} frames")]
    TooLong {
        /// Number of stereo frames in the buffer.
        frames: usize,
    },
}

/// An operation was attempted on an empty composition or layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The composition has no notes to play or export.
    #[error("the composition has no notes")]
    EmptyComposition,

    /// Harmony generation needs a melody to work from.
    #[error("enter a melody before generating harmony")]
    EmptyMelody,
}

/// Invalid note data or a failed composition file operation.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// A note field is out of range.
    #[error("invalid note: {0}")]
    InvalidNote(String),

    /// Reading or writing a composition file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary (de)serialization failed.
    #[error("binary format error: {0}")]
    Binary(#[from] bincode::Error),
}

/// Any error the library can report.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Score(#[from] ScoreError),
}

/// Result type for library operations.
pub type Result<T> = std::result::Result<T, Error>;
