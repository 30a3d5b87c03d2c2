//! Parameter automation timelines.
//!
//! An [`Automation`] is a time-ordered list of value events, evaluated at
//! arbitrary times relative to the voice start. It drives gains (envelopes)
//! and oscillator frequencies (pitch sweeps). Semantics:
//!
//! - `set_value_at(t, v)` jumps to `v` at `t` and holds it.
//! - `linear_ramp_to(t, v)` ramps linearly from the previous event to `v`,
//!   reaching it exactly at `t`.
//! - `exponential_ramp_to(t, v)` ramps geometrically from the previous event.
//!   If either end is zero or the signs differ, the previous value is held
//!   until `t` and then jumps, so targets should use [`SILENCE_FLOOR`].

/// Smallest gain used as the target of exponential decays.
pub const SILENCE_FLOOR: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
enum EventKind {
    Set,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Event {
    time: f64,
    value: f64,
    kind: EventKind,
}

/// A value that changes over time.
#[derive(Debug, Clone, PartialEq)]
pub struct Automation {
    default: f64,
    events: Vec<Event>,
}

impl Automation {
    /// Creates a timeline that holds `default` until the first event.
    pub fn new(default: f64) -> Self {
        Self {
            default,
            events: Vec::new(),
        }
    }

    /// Creates a timeline that never changes.
    pub fn constant(value: f64) -> Self {
        Self::new(value)
    }

    /// Jumps to `value` at `time`.
    pub fn set_value_at(mut self, time: f64, value: f64) -> Self {
        self.insert(time, value, EventKind::Set);
        self
    }

    /// Ramps linearly to `value`, arriving at `time`.
    pub fn linear_ramp_to(mut self, time: f64, value: f64) -> Self {
        self.insert(time, value, EventKind::Linear);
        self
    }

    /// Ramps exponentially to `value`, arriving at `time`.
    pub fn exponential_ramp_to(mut self, time: f64, value: f64) -> Self {
        self.insert(time, value, EventKind::Exponential);
        self
    }

    fn insert(&mut self, time: f64, value: f64, kind: EventKind) {
        let time = time.max(0.0);
        // Events at equal times keep insertion order.
        let pos = self.events.partition_point(|e| e.time <= time);
        self.events.insert(pos, Event { time, value, kind });
    }

    /// Evaluates the timeline at `time` seconds.
    pub fn value_at(&self, time: f64) -> f64 {
        let next_idx = self.events.partition_point(|e| e.time <= time);

        let (prev_time, prev_value) = match next_idx.checked_sub(1) {
            Some(i) => (self.events[i].time, self.events[i].value),
            None => (0.0, self.default),
        };

        let Some(next) = self.events.get(next_idx) else {
            return prev_value;
        };

        let span = next.time - prev_time;
        if span <= 0.0 {
            return prev_value;
        }
        let progress = ((time - prev_time) / span).clamp(0.0, 1.0);

        match next.kind {
            EventKind::Set => prev_value,
            EventKind::Linear => prev_value + (next.value - prev_value) * progress,
            EventKind::Exponential => {
                if prev_value * next.value <= 0.0 {
                    prev_value
                } else {
                    prev_value * (next.value / prev_value).powf(progress)
                }
            }
        }
    }

    /// Samples the timeline into `out`, starting at time zero.
    pub fn render(&self, sample_rate: f64, out: &mut [f64]) {
        if self.events.is_empty() {
            out.fill(self.default);
            return;
        }
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.value_at(i as f64 / sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant() {
        let a = Automation::constant(0.5);
        assert_eq!(a.value_at(0.0), 0.5);
        assert_eq!(a.value_at(10.0), 0.5);
    }

    #[test]
    fn test_linear_attack() {
        let a = Automation::new(0.0)
            .set_value_at(0.0, 0.0)
            .linear_ramp_to(0.01, 1.0);
        assert_eq!(a.value_at(0.0), 0.0);
        assert_relative_eq!(a.value_at(0.005), 0.5, epsilon = 1e-12);
        assert_eq!(a.value_at(0.01), 1.0);
        assert_eq!(a.value_at(0.5), 1.0);
    }

    #[test]
    fn test_exponential_decay() {
        let a = Automation::new(1.0)
            .set_value_at(0.0, 1.0)
            .exponential_ramp_to(1.0, SILENCE_FLOOR);
        assert_relative_eq!(a.value_at(0.5), SILENCE_FLOOR.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(a.value_at(1.0), SILENCE_FLOOR, epsilon = 1e-12);
    }

    #[test]
    fn test_exponential_from_zero_holds() {
        let a = Automation::new(0.0).exponential_ramp_to(1.0, 0.5);
        assert_eq!(a.value_at(0.5), 0.0);
        assert_eq!(a.value_at(1.0), 0.5);
    }

    #[test]
    fn test_set_holds_until_event() {
        let a = Automation::new(0.8)
            .set_value_at(0.0, 0.8)
            .set_value_at(1.0, 0.4);
        assert_eq!(a.value_at(0.99), 0.8);
        assert_eq!(a.value_at(1.0), 0.4);
    }

    #[test]
    fn test_out_of_order_events_are_sorted() {
        let a = Automation::new(0.0)
            .linear_ramp_to(1.0, 1.0)
            .set_value_at(0.0, 0.0);
        assert_relative_eq!(a.value_at(0.5), 0.5, epsilon = 1e-12);
        assert_eq!(a.value_at(1.0), 1.0);
    }

    #[test]
    fn test_render_matches_value_at() {
        let a = Automation::new(0.0)
            .set_value_at(0.0, 0.0)
            .linear_ramp_to(0.001, 1.0);
        let mut out = vec![0.0; 100];
        a.render(44100.0, &mut out);
        for (i, v) in out.iter().enumerate() {
            assert_eq!(*v, a.value_at(i as f64 / 44100.0));
        }
    }
}
