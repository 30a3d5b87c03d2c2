//! Offline rendering of a whole composition.

use super::buffer::StereoBuffer;
use super::scheduler::VoiceQueue;
use super::transport::MIN_RENDER_SECONDS;
use super::voice::{RenderContext, Voice, VoiceRequest};
use crate::score::{Composition, Layers};
use rayon::prelude::*;
use tracing::{error, info};

/// A rendered composition.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    /// Mixed stereo output.
    pub buffer: StereoBuffer,
    /// Number of notes that could not be voiced.
    pub skipped: usize,
}

/// Length of an offline render: the last note end over both layers, never
/// shorter than [`MIN_RENDER_SECONDS`].
pub fn render_length(composition: &Composition) -> f64 {
    composition.end_time(Layers::All).max(MIN_RENDER_SECONDS)
}

/// Renders melody and harmony into one stereo buffer.
///
/// Every note is queued and the queue drained at once. Voices are
/// synthesized in parallel, then summed in queue order so the mix is the
/// same on every run. Notes whose voice cannot be built are logged and
/// counted in `skipped`.
///
/// # Arguments
///
/// * `composition` - Snapshot to render
/// * `ctx` - Sample rate and master volume for every voice
pub fn render_offline(composition: &Composition, ctx: RenderContext) -> RenderedAudio {
    let length = render_length(composition);
    let mut buffer = StereoBuffer::with_duration(length, ctx.sample_rate);

    let mut queue = VoiceQueue::new();
    for note in composition.notes(Layers::All) {
        queue.push(note.start, VoiceRequest::from(note));
    }
    let requests = queue.drain();

    let rendered: Vec<Option<(usize, Vec<f64>)>> = requests
        .par_iter()
        .map(|request| match Voice::build(request, ctx) {
            Ok(voice) => Some((
                request.offset_frames(ctx.sample_rate),
                voice.render(ctx.sample_rate),
            )),
            Err(e) => {
                error!(pitch = request.pitch, start = request.start, "Skipping note: {}", e);
                None
            }
        })
        .collect();

    let mut skipped = 0;
    for voice in rendered {
        match voice {
            Some((offset, samples)) => buffer.add_mono_at(offset, &samples),
            None => skipped += 1,
        }
    }

    info!(
        notes = requests.len(),
        skipped,
        frames = buffer.frames(),
        seconds = buffer.duration(),
        "Offline render complete"
    );
    RenderedAudio { buffer, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Note;

    #[test]
    fn test_render_length_floor() {
        assert_eq!(render_length(&Composition::new()), 4.0);
        let mut composition = Composition::new();
        composition.add_note(Note::new(60, 5.0, 2.5, 0.7, "sine"));
        assert_eq!(render_length(&composition), 7.5);
    }

    #[test]
    fn test_empty_composition_renders_silence() {
        let rendered = render_offline(&Composition::new(), RenderContext::default());
        assert_eq!(rendered.buffer.frames(), 176_400);
        assert_eq!(rendered.buffer.peak(), 0.0);
        assert_eq!(rendered.skipped, 0);
    }

    #[test]
    fn test_harmony_layer_is_included() {
        let mut composition = Composition::new();
        composition.add_note(Note::new(60, 0.0, 1.0, 0.7, "sine"));
        composition.set_harmony(vec![Note::new(48, 2.0, 1.0, 0.4, "piano")], vec![]);
        let rendered = render_offline(&composition, RenderContext::default());
        assert!(rendered.buffer.energy_between(2.0, 3.0) > 0.0);
    }

    #[test]
    fn test_invalid_note_is_skipped() {
        let mut composition = Composition::new();
        composition.add_note(Note::new(60, 0.0, 1.0, 0.7, "sine"));
        let mut broken = Note::new(62, 1.0, 1.0, 0.7, "sine");
        broken.duration = -1.0;
        composition.add_note(broken);

        let rendered = render_offline(&composition, RenderContext::default());
        assert_eq!(rendered.skipped, 1);
        assert!(rendered.buffer.energy_between(0.0, 1.0) > 0.0);
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut composition = Composition::new();
        composition.add_note(Note::drum("snare", 38, 0.0, 0.8));
        composition.add_note(Note::new(40, 0.5, 1.0, 0.8, "acoustic-guitar"));
        let ctx = RenderContext::default();
        assert_eq!(render_offline(&composition, ctx), render_offline(&composition, ctx));
    }
}
