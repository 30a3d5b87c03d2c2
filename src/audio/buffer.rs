//! Planar stereo sample buffer used as the offline mix bus.

/// Two-channel buffer of f32 samples in [-1, 1] (not enforced until encode).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StereoBuffer {
    sample_rate: u32,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl StereoBuffer {
    /// Creates a silent buffer of `frames` frames.
    pub fn new(frames: usize, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    /// Creates a silent buffer long enough to hold `seconds` of audio,
    /// rounding the frame count up.
    pub fn with_duration(seconds: f64, sample_rate: u32) -> Self {
        Self::new(frames_for(seconds, sample_rate), sample_rate)
    }

    /// Builds a buffer from existing channel data. The shorter channel is
    /// padded with silence.
    pub fn from_channels(mut left: Vec<f32>, mut right: Vec<f32>, sample_rate: u32) -> Self {
        let frames = left.len().max(right.len());
        left.resize(frames, 0.0);
        right.resize(frames, 0.0);
        Self {
            sample_rate,
            left,
            right,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of stereo frames.
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn channels(&self) -> u16 {
        2
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    /// Sums a mono signal into both channels starting at frame `offset`.
    /// Samples past the end of the buffer are dropped.
    pub fn add_mono_at(&mut self, offset: usize, samples: &[f64]) {
        if offset >= self.frames() {
            return;
        }
        let end = (offset + samples.len()).min(self.frames());
        let span = offset..end;
        for ((l, r), s) in self.left[span.clone()]
            .iter_mut()
            .zip(self.right[span].iter_mut())
            .zip(samples)
        {
            *l += *s as f32;
            *r += *s as f32;
        }
    }

    /// Interleaves the channels as L, R, L, R, ...
    pub fn interleaved(&self) -> Vec<f32> {
        self.left
            .iter()
            .zip(&self.right)
            .flat_map(|(l, r)| [*l, *r])
            .collect()
    }

    /// Largest absolute sample value on either channel.
    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(&self.right)
            .fold(0.0, |acc, s| acc.max(s.abs()))
    }

    /// Sum of squared samples (both channels) between two times in seconds.
    pub fn energy_between(&self, from: f64, to: f64) -> f64 {
        let start = frames_for(from.max(0.0), self.sample_rate).min(self.frames());
        let end = frames_for(to.max(0.0), self.sample_rate).min(self.frames());
        if start >= end {
            return 0.0;
        }
        self.left[start..end]
            .iter()
            .chain(&self.right[start..end])
            .map(|s| (*s as f64) * (*s as f64))
            .sum()
    }
}

/// Number of frames needed to hold `seconds` at `sample_rate`, rounded up.
pub fn frames_for(seconds: f64, sample_rate: u32) -> usize {
    (seconds * sample_rate as f64).ceil().max(0.0) as usize
}
