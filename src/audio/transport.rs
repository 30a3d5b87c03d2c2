//! Real-time transport over a composition snapshot.
//!
//! The transport does not own a clock. Its driver calls [`Transport::tick`]
//! with the time elapsed since playback started, sleeping until
//! [`Transport::next_deadline`] in between; tests drive it with synthetic
//! times.

use super::scheduler::VoiceQueue;
use super::voice::{RenderContext, VoiceRequest};
use crate::score::{Composition, Layers};
use std::time::Duration;
use tracing::{debug, info};

/// Interval at which the playback position advances.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Shortest playback or render length, in seconds.
pub const MIN_RENDER_SECONDS: f64 = 4.0;

/// Receives voices as the transport fires them.
pub trait VoiceSink {
    /// Starts sounding `request` now. The request's `start` is its score
    /// position, not a delay.
    fn play(&mut self, request: VoiceRequest, ctx: RenderContext);
}

/// Playback state machine: stopped, or playing a queue of triggers.
#[derive(Debug, Default)]
pub struct Transport {
    queue: VoiceQueue,
    playing: bool,
    /// Tick periods processed since start.
    ticks: u64,
    current_time: f64,
    end_time: f64,
    progress: f64,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts playback of the selected layers.
    ///
    /// # Returns
    ///
    /// false (and does nothing) if already playing
    pub fn start(&mut self, composition: &Composition, layers: Layers) -> bool {
        if self.playing {
            debug!("Transport already playing, ignoring start");
            return false;
        }

        self.queue.clear();
        for note in composition.notes(layers) {
            self.queue.push(note.start, VoiceRequest::from(note));
        }
        self.end_time = composition.end_time(layers).max(MIN_RENDER_SECONDS);
        self.ticks = 0;
        self.current_time = 0.0;
        self.progress = 0.0;
        self.playing = true;

        info!(
            notes = self.queue.len(),
            end_time = self.end_time,
            ?layers,
            "Playback started"
        );
        true
    }

    /// Advances the transport to `elapsed` since start.
    ///
    /// Fires every trigger that has come due into `sink`, advances the
    /// position by one step per full [`TICK_PERIOD`], and stops once the
    /// end time is reached.
    ///
    /// # Returns
    ///
    /// Whether the transport is still playing
    pub fn tick(
        &mut self,
        elapsed: Duration,
        ctx: RenderContext,
        sink: &mut dyn VoiceSink,
    ) -> bool {
        if !self.playing {
            return false;
        }

        let now = elapsed.as_secs_f64();
        for request in self.queue.pop_due(now) {
            debug!(pitch = request.pitch, start = request.start, "Trigger");
            sink.play(request, ctx);
        }

        let periods = (elapsed.as_millis() / TICK_PERIOD.as_millis()) as u64;
        if periods > self.ticks {
            self.ticks = periods;
            self.current_time = periods as f64 * TICK_PERIOD.as_secs_f64();
            self.progress = (self.current_time / self.end_time * 100.0).min(100.0);
        }

        if now >= self.end_time {
            info!(end_time = self.end_time, "Playback finished");
            self.stop();
        }
        self.playing
    }

    /// Cancels pending triggers and the position tick. Voices already
    /// fired keep sounding. Safe to call when stopped.
    pub fn stop(&mut self) {
        if self.playing {
            debug!(cancelled = self.queue.len(), "Playback stopped");
        }
        self.queue.clear();
        self.playing = false;
        self.progress = 0.0;
    }

    /// Elapsed time of the next trigger, position tick or end, whichever
    /// comes first. None when stopped.
    pub fn next_deadline(&self) -> Option<Duration> {
        if !self.playing {
            return None;
        }
        let next_tick = TICK_PERIOD * (self.ticks + 1) as u32;
        let end = seconds_ceil(self.end_time);
        let deadline = match self.queue.peek_time() {
            Some(t) => next_tick.min(seconds_ceil(t)).min(end),
            None => next_tick.min(end),
        };
        Some(deadline)
    }

    /// Playback progress, 0-100.
    pub fn progress_percent(&self) -> f64 {
        self.progress
    }

    /// Position in seconds, advanced in tick steps.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Length of the current pass in seconds.
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Number of triggers not yet fired.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Converts seconds to a duration, rounding up to the next nanosecond so a
/// deadline never lands before the time it stands for.
fn seconds_ceil(seconds: f64) -> Duration {
    Duration::from_nanos((seconds.max(0.0) * 1e9).ceil() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Note;

    #[derive(Default)]
    struct RecordingSink {
        fired: Vec<VoiceRequest>,
    }

    impl VoiceSink for RecordingSink {
        fn play(&mut self, request: VoiceRequest, _ctx: RenderContext) {
            self.fired.push(request);
        }
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn composition() -> Composition {
        let mut composition = Composition::new();
        composition.add_note(Note::new(60, 0.0, 1.0, 0.7, "sine"));
        composition.add_note(Note::new(64, 0.25, 1.0, 0.7, "sine"));
        composition.set_harmony(vec![Note::new(48, 1.0, 5.0, 0.4, "piano")], vec![]);
        composition
    }

    #[test]
    fn test_start_computes_end_time() {
        let mut transport = Transport::new();
        assert!(transport.start(&composition(), Layers::Melody));
        assert_eq!(transport.end_time(), MIN_RENDER_SECONDS);
        assert_eq!(transport.pending(), 2);

        transport.stop();
        assert!(transport.start(&composition(), Layers::All));
        assert_eq!(transport.end_time(), 6.0);
        assert_eq!(transport.pending(), 3);
    }

    #[test]
    fn test_start_while_playing_is_ignored() {
        let mut transport = Transport::new();
        assert!(transport.start(&composition(), Layers::Melody));
        assert!(!transport.start(&composition(), Layers::All));
        assert_eq!(transport.pending(), 2);
    }

    #[test]
    fn test_triggers_fire_when_due() {
        let mut transport = Transport::new();
        let mut sink = RecordingSink::default();
        let ctx = RenderContext::default();
        transport.start(&composition(), Layers::Melody);

        transport.tick(ms(0), ctx, &mut sink);
        assert_eq!(sink.fired.len(), 1);
        assert_eq!(transport.next_deadline(), Some(ms(100)));

        transport.tick(ms(100), ctx, &mut sink);
        assert_eq!(sink.fired.len(), 1);
        assert_eq!(transport.next_deadline(), Some(ms(200)));

        transport.tick(ms(200), ctx, &mut sink);
        assert_eq!(transport.next_deadline(), Some(ms(250)));
        transport.tick(ms(250), ctx, &mut sink);
        assert_eq!(sink.fired.len(), 2);
        assert_eq!(sink.fired[1].pitch, 64);
    }

    #[test]
    fn test_progress_advances_per_tick() {
        let mut transport = Transport::new();
        let mut sink = RecordingSink::default();
        let ctx = RenderContext::default();
        transport.start(&composition(), Layers::Melody);

        transport.tick(ms(50), ctx, &mut sink);
        assert_eq!(transport.current_time(), 0.0);
        transport.tick(ms(1000), ctx, &mut sink);
        assert!((transport.current_time() - 1.0).abs() < 1e-9);
        assert!((transport.progress_percent() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_auto_stop_at_end() {
        let mut transport = Transport::new();
        let mut sink = RecordingSink::default();
        let ctx = RenderContext::default();
        transport.start(&composition(), Layers::Melody);

        assert!(transport.tick(ms(3900), ctx, &mut sink));
        assert!(!transport.tick(ms(4000), ctx, &mut sink));
        assert!(!transport.is_playing());
        assert_eq!(transport.progress_percent(), 0.0);
        assert_eq!(transport.next_deadline(), None);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut transport = Transport::new();
        transport.stop();
        transport.start(&composition(), Layers::All);
        transport.stop();
        transport.stop();
        assert!(!transport.is_playing());
        assert_eq!(transport.pending(), 0);
        assert_eq!(transport.progress_percent(), 0.0);
    }

    #[test]
    fn test_stop_cancels_pending_triggers() {
        let mut transport = Transport::new();
        let mut sink = RecordingSink::default();
        let ctx = RenderContext::default();
        transport.start(&composition(), Layers::Melody);
        transport.tick(ms(0), ctx, &mut sink);
        transport.stop();
        assert!(!transport.tick(ms(500), ctx, &mut sink));
        assert_eq!(sink.fired.len(), 1);
    }
}
