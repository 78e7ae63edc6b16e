//! Automatable parameter timelines (gain, frequency).
//!
//! A `Param` holds a base value and a time-ordered list of automation events,
//! evaluated against the graph clock in seconds. The curve shapes follow the
//! browser audio parameter model: step, linear ramp, exponential ramp and
//! exponential approach to a target.

#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    SetValue { time: f64, value: f32 },
    LinearRamp { time: f64, value: f32 },
    ExponentialRamp { time: f64, value: f32 },
    SetTarget { time: f64, target: f32, time_constant: f64 },
}

impl Event {
    fn time(&self) -> f64 {
        match *self {
            Event::SetValue { time, .. }
            | Event::LinearRamp { time, .. }
            | Event::ExponentialRamp { time, .. }
            | Event::SetTarget { time, .. } => time,
        }
    }
}

/// An in-progress approach started by a `SetTarget` event.
#[derive(Debug, Clone, Copy)]
struct Approach {
    start: f64,
    from: f32,
    target: f32,
    time_constant: f64,
}

impl Approach {
    fn value_at(&self, t: f64) -> f32 {
        if self.time_constant <= 0.0 {
            return self.target;
        }
        let decay = (-(t - self.start) / self.time_constant).exp() as f32;
        self.target + (self.from - self.target) * decay
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    default: f32,
    events: Vec<Event>,
}

impl Param {
    pub fn new(value: f32) -> Self {
        Param { default: value, events: Vec::new() }
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Event::SetValue { time, value });
        self
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Event::LinearRamp { time, value });
        self
    }

    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Event::ExponentialRamp { time, value });
        self
    }

    pub fn set_target_at_time(&mut self, target: f32, start: f64, time_constant: f64) -> &mut Self {
        self.insert(Event::SetTarget { time: start, target, time_constant });
        self
    }

    /// Freeze the curve at `time`: everything scheduled after it is dropped
    /// and the value reached at `time` is held from then on. Earlier history
    /// collapses into that single held value.
    pub fn cancel_and_hold_at_time(&mut self, time: f64) -> &mut Self {
        let held = self.value_at(time);
        self.events.clear();
        self.events.push(Event::SetValue { time, value: held });
        self
    }

    #[cfg(test)]
    pub(crate) fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn value_at(&self, t: f64) -> f32 {
        let mut anchor = (f64::NEG_INFINITY, self.default);
        let mut approach: Option<Approach> = None;

        for event in &self.events {
            match *event {
                Event::SetValue { time, value } => {
                    if t < time {
                        break;
                    }
                    approach = None;
                    anchor = (time, value);
                }
                Event::LinearRamp { time, value } => {
                    // A ramp following a target approach replaces it from its start
                    let (t0, v0) = approach.take().map_or(anchor, |a| (a.start, a.from));
                    if t < time {
                        if !t0.is_finite() || t <= t0 {
                            return v0;
                        }
                        let progress = ((t - t0) / (time - t0)) as f32;
                        return v0 + (value - v0) * progress;
                    }
                    anchor = (time, value);
                }
                Event::ExponentialRamp { time, value } => {
                    let (t0, v0) = approach.take().map_or(anchor, |a| (a.start, a.from));
                    if t < time {
                        if !t0.is_finite() || t <= t0 || v0 == 0.0 || v0.signum() != value.signum() {
                            return v0;
                        }
                        let progress = ((t - t0) / (time - t0)) as f32;
                        return v0 * (value / v0).powf(progress);
                    }
                    anchor = (time, value);
                }
                Event::SetTarget { time, target, time_constant } => {
                    if t < time {
                        break;
                    }
                    let from = approach.map_or(anchor.1, |a| a.value_at(time));
                    approach = Some(Approach { start: time, from, target, time_constant });
                }
            }
        }

        match approach {
            Some(a) => a.value_at(t),
            None => anchor.1,
        }
    }

    fn insert(&mut self, event: Event) {
        let at = self.events
            .iter()
            .position(|e| e.time() > event.time())
            .unwrap_or(self.events.len());
        self.events.insert(at, event);
    }
}
