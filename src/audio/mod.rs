//! Sound synthesis, playback and export.
//!
//! Voices are built from a small set of DSP primitives (automation
//! timelines, oscillators, biquad filters, a waveshaper and a compressor).
//! The same voice code feeds two drivers:
//! - the real-time transport, which fires voices into rodio as their start
//!   times come due
//! - the offline renderer, which mixes every voice into a stereo buffer for
//!   WAV or stub-mp3 export

pub mod automation;
pub mod buffer;
pub mod dynamics;
pub mod engine;
pub mod export;
pub mod filter;
pub mod oscillator;
pub mod render;
pub mod scheduler;
pub mod transport;
pub mod voice;

/// Sample rate for synthesis and export (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

pub use buffer::StereoBuffer;
pub use engine::{AudioEngine, RodioSink, StopHandle};
pub use export::{encode_stub_mp3, encode_wav, export, AudioBlob, ExportFormat};
pub use render::{render_length, render_offline, RenderedAudio};
pub use scheduler::VoiceQueue;
pub use transport::{Transport, VoiceSink, MIN_RENDER_SECONDS, TICK_PERIOD};
pub use voice::{synthesize, RenderContext, Voice, VoiceRequest};
