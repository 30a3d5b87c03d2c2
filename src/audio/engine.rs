//! Live playback through the default audio output.
//!
//! Each fired voice is rendered into its own buffer and handed to rodio's
//! mixer; nothing is shared between voices, so a voice keeps sounding after
//! the transport that fired it has stopped.

use super::transport::{Transport, VoiceSink, TICK_PERIOD};
use super::voice::{RenderContext, Voice, VoiceRequest};
use crate::error::InitializationError;
use crate::score::{Layers, Note};
use crate::session::Session;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info};

/// Sends fired voices to a rodio output.
pub struct RodioSink {
    handle: OutputStreamHandle,
}

impl RodioSink {
    pub fn new(handle: OutputStreamHandle) -> Self {
        Self { handle }
    }
}

impl VoiceSink for RodioSink {
    fn play(&mut self, request: VoiceRequest, ctx: RenderContext) {
        let voice = match Voice::build(&request, ctx) {
            Ok(voice) => voice,
            Err(e) => {
                error!(pitch = request.pitch, start = request.start, "Skipping note: {}", e);
                return;
            }
        };

        // Mono to interleaved stereo
        let samples: Vec<f32> = voice
            .render(ctx.sample_rate)
            .into_iter()
            .flat_map(|s| [s as f32; 2])
            .collect();

        if let Err(e) = self
            .handle
            .play_raw(SamplesBuffer::new(2, ctx.sample_rate, samples))
        {
            error!("Failed to start voice: {}", e);
        }
    }
}

/// Cancels a running [`AudioEngine::play`] from another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Requests that playback stop at the next wakeup.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Owns the audio output and drives the transport in real time.
pub struct AudioEngine {
    /// Audio output stream (must be kept alive).
    _stream: OutputStream,
    /// Audio output handle for playback.
    handle: OutputStreamHandle,
    stop: StopHandle,
}

impl AudioEngine {
    /// Opens the default output device.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError::OutputUnavailable` if no output device
    /// can be opened
    pub fn new() -> Result<Self, InitializationError> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| InitializationError::OutputUnavailable(e.to_string()))?;
        info!("Audio output opened");
        Ok(Self {
            _stream: stream,
            handle,
            stop: StopHandle::default(),
        })
    }

    /// Handle that stops the current or next [`play`](Self::play) call.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Plays the selected layers of the session's composition, blocking
    /// until the end or until the stop handle fires.
    ///
    /// The loop sleeps until the transport's next deadline (at most one
    /// tick period, so a stop request is seen promptly), then ticks it.
    /// Master volume is read from the session at every tick, and progress
    /// is written back to the session and passed to `on_progress`.
    ///
    /// # Arguments
    ///
    /// * `session` - Source of the composition and master volume
    /// * `layers` - Melody only, or melody and harmony
    /// * `on_progress` - Called with the progress (0-100) after every tick
    pub fn play<F>(&self, session: &mut Session, layers: Layers, mut on_progress: F)
    where
        F: FnMut(f64),
    {
        let snapshot = session.composition().snapshot();
        let mut transport = Transport::new();
        let mut sink = RodioSink::new(self.handle.clone());

        self.stop.reset();
        transport.start(&snapshot, layers);
        let started = Instant::now();

        while transport.is_playing() {
            if self.stop.is_stopped() {
                transport.stop();
                break;
            }

            if let Some(deadline) = transport.next_deadline() {
                let wait = deadline.saturating_sub(started.elapsed()).min(TICK_PERIOD);
                if !wait.is_zero() {
                    thread::sleep(wait);
                }
            }

            transport.tick(started.elapsed(), session.render_context(), &mut sink);
            session.set_progress(transport.progress_percent());
            on_progress(transport.progress_percent());
        }

        session.set_progress(0.0);
        debug!(elapsed = ?started.elapsed(), "Playback loop exited");
    }

    /// Plays one note immediately, ignoring its start time.
    pub fn preview(&self, note: &Note, ctx: RenderContext) {
        let mut request = VoiceRequest::from(note);
        request.start = 0.0;
        RodioSink::new(self.handle.clone()).play(request, ctx);
    }
}
