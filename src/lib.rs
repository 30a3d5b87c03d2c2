//! scorecraft - multi-track score synthesis, playback and export.
//!
//! This library provides the composition model, a per-note synthesis engine,
//! a real-time playback transport, an offline renderer with WAV export, and
//! a simple harmony generator.

pub mod audio;
pub mod error;
pub mod harmony;
pub mod score;
pub mod session;

// Re-export commonly used types
pub use audio::{AudioBlob, AudioEngine, ExportFormat, RenderContext, Transport, SAMPLE_RATE};
pub use error::{Error, Result};
pub use harmony::{HarmonyGenerator, HarmonyResult};
pub use score::{Composition, Layers, Note, NoteId};
pub use session::{Session, SessionConfig};
