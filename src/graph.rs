//! The render graph shared between the control thread, the tabla scheduler and
//! the output callback.
//!
//! Every voice is a fixed chain `source -> [shaper] -> [filter] -> gain`. The
//! graph owns a frame clock; voice start/stop times and parameter automation
//! are expressed in seconds on that clock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::effects::{BiquadFilter, WaveShaper};
use crate::instrument::SampleData;
use crate::param::Param;
use crate::waveform::Oscillator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(u64);

/// Plays a decoded buffer at a playback rate, optionally looping.
#[derive(Debug, Clone)]
pub struct BufferPlayer {
    pub data: SampleData,
    pub playback_rate: f32,
    pub looping: bool,
    position: f64,
}

impl BufferPlayer {
    pub fn new(data: SampleData, playback_rate: f32, looping: bool) -> Self {
        BufferPlayer { data, playback_rate, looping, position: 0.0 }
    }

    /// Next interpolated sample, `None` once a one-shot has run off the end.
    pub fn next_sample(&mut self, output_rate: f32) -> Option<f32> {
        let samples = &self.data.samples;
        let len = samples.len();
        if len == 0 {
            return None;
        }

        if self.position >= len as f64 {
            if !self.looping {
                return None;
            }
            self.position %= len as f64;
        }

        let idx = self.position as usize;
        let frac = (self.position - idx as f64) as f32;
        let next = if idx + 1 < len {
            samples[idx + 1]
        } else if self.looping {
            samples[0]
        } else {
            samples[idx]
        };
        let value = samples[idx] * (1.0 - frac) + next * frac;

        self.position += self.playback_rate as f64 * self.data.sample_rate as f64 / output_rate as f64;
        Some(value)
    }

    pub fn position(&self) -> f64 {
        self.position
    }
}

#[derive(Debug, Clone)]
pub enum Source {
    Buffer(BufferPlayer),
    Oscillators(Vec<Oscillator>),
}

#[derive(Debug, Clone)]
pub struct Voice {
    pub source: Source,
    pub shaper: Option<WaveShaper>,
    pub filter: Option<BiquadFilter>,
    pub gain: Param,
    pub start_time: f64,
    pub stop_time: Option<f64>,
    finished: bool,
}

impl Voice {
    pub fn new(source: Source, start_time: f64) -> Self {
        Voice {
            source,
            shaper: None,
            filter: None,
            gain: Param::new(1.0),
            start_time,
            stop_time: None,
            finished: false,
        }
    }

    pub fn with_shaper(mut self, shaper: WaveShaper) -> Self {
        self.shaper = Some(shaper);
        self
    }

    pub fn with_filter(mut self, filter: BiquadFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_gain(mut self, gain: Param) -> Self {
        self.gain = gain;
        self
    }

    pub fn stop_at(mut self, time: f64) -> Self {
        self.stop_time = Some(time);
        self
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn buffer(&self) -> Option<&BufferPlayer> {
        match &self.source {
            Source::Buffer(player) => Some(player),
            Source::Oscillators(_) => None,
        }
    }

    pub fn oscillators(&self) -> &[Oscillator] {
        match &self.source {
            Source::Oscillators(oscs) => oscs,
            Source::Buffer(_) => &[],
        }
    }

    pub fn next_sample(&mut self, time: f64, sample_rate: f32) -> f32 {
        if self.finished || time < self.start_time {
            return 0.0;
        }
        if self.stop_time.is_some_and(|stop| time >= stop) {
            self.finished = true;
            return 0.0;
        }

        let raw = match &mut self.source {
            Source::Buffer(player) => match player.next_sample(sample_rate) {
                Some(s) => s,
                None => {
                    self.finished = true;
                    return 0.0;
                }
            },
            Source::Oscillators(oscs) => oscs
                .iter_mut()
                .map(|osc| osc.next_sample(time, sample_rate))
                .sum::<f32>(),
        };

        let mut output = raw;
        if let Some(shaper) = &self.shaper {
            output = shaper.process(output);
        }
        if let Some(filter) = &mut self.filter {
            output = filter.process(output);
        }
        output * self.gain.value_at(time)
    }
}

pub struct Graph {
    sample_rate: f32,
    frame: u64,
    voices: Vec<(VoiceId, Voice)>,
    next_id: u64,
}

impl Graph {
    pub fn new(sample_rate: f32) -> Self {
        Graph {
            sample_rate,
            frame: 0,
            voices: Vec::new(),
            next_id: 0,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    pub fn add(&mut self, voice: Voice) -> VoiceId {
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        self.voices.push((id, voice));
        id
    }

    /// Stop and disconnect a voice. Unknown or already finished ids are ignored.
    pub fn remove(&mut self, id: VoiceId) -> bool {
        let before = self.voices.len();
        self.voices.retain(|(vid, _)| *vid != id);
        before != self.voices.len()
    }

    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.iter().find(|(vid, _)| *vid == id).map(|(_, v)| v)
    }

    pub fn voice_mut(&mut self, id: VoiceId) -> Option<&mut Voice> {
        self.voices.iter_mut().find(|(vid, _)| *vid == id).map(|(_, v)| v)
    }

    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter().map(|(_, v)| v)
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Mix every voice into interleaved `out`, one frame per `channels` samples.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let time = self.current_time();
            let mut mix = 0.0_f32;
            for (_, voice) in self.voices.iter_mut() {
                mix += voice.next_sample(time, self.sample_rate);
            }
            let mix = mix.clamp(-1.0, 1.0);
            for sample in frame.iter_mut() {
                *sample = mix;
            }
            self.frame += 1;
        }
        self.voices.retain(|(_, v)| !v.is_finished());
    }
}

/// Lock the graph even if a panicking holder poisoned the mutex; the graph
/// stays structurally valid between samples.
pub fn lock(graph: &Mutex<Graph>) -> MutexGuard<'_, Graph> {
    graph.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::WaveformType;

    fn ramp_buffer(len: usize) -> SampleData {
        SampleData::new((0..len).map(|i| i as f32 / len as f32).collect(), 100)
    }

    #[test]
    fn buffer_player_resamples_to_output_rate() {
        // 100 Hz buffer played into a 200 Hz output moves half a sample per frame
        let mut player = BufferPlayer::new(ramp_buffer(10), 1.0, false);
        player.next_sample(200.0);
        assert!((player.position() - 0.5).abs() < 1e-9);
        let v = player.next_sample(200.0).unwrap_or(-1.0);
        assert!((v - 0.05).abs() < 1e-6);
    }

    #[test]
    fn one_shot_ends_and_loop_wraps() {
        let mut one_shot = BufferPlayer::new(ramp_buffer(4), 2.0, false);
        let mut produced = 0;
        while one_shot.next_sample(100.0).is_some() {
            produced += 1;
        }
        assert_eq!(produced, 2);

        let mut looped = BufferPlayer::new(ramp_buffer(4), 2.0, true);
        for _ in 0..100 {
            assert!(looped.next_sample(100.0).is_some());
        }
    }

    #[test]
    fn voice_silent_before_start_and_after_stop() {
        let osc = Oscillator::new(WaveformType::Square, 10.0);
        let mut voice = Voice::new(Source::Oscillators(vec![osc]), 1.0).stop_at(2.0);
        assert_eq!(voice.next_sample(0.5, 100.0), 0.0);
        assert!(voice.next_sample(1.0, 100.0).abs() > 0.0);
        assert_eq!(voice.next_sample(2.0, 100.0), 0.0);
        assert!(voice.is_finished());
    }

    #[test]
    fn render_advances_clock_and_drops_finished_voices() {
        let mut graph = Graph::new(100.0);
        let osc = Oscillator::new(WaveformType::Square, 10.0);
        let id = graph.add(Voice::new(Source::Oscillators(vec![osc]), 0.0).stop_at(0.5));
        assert!(graph.voice(id).is_some());

        let mut out = vec![0.0; 200]; // 100 stereo frames
        graph.render(&mut out, 2);
        assert!((graph.current_time() - 1.0).abs() < 1e-9);
        assert_eq!(out[0], out[1]);
        assert!(out[0] > 0.0);
        assert!(out[180..].iter().all(|s| *s == 0.0));
        assert_eq!(graph.active_voices(), 0);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut graph = Graph::new(100.0);
        let id = graph.add(Voice::new(Source::Oscillators(Vec::new()), 0.0));
        assert!(graph.remove(id));
        assert!(!graph.remove(id));
    }

    #[test]
    fn mix_is_clamped() {
        let mut graph = Graph::new(100.0);
        for _ in 0..4 {
            let osc = Oscillator::new(WaveformType::Square, 1.0);
            graph.add(Voice::new(Source::Oscillators(vec![osc]), 0.0));
        }
        let mut out = vec![0.0; 10];
        graph.render(&mut out, 1);
        assert!(out.iter().all(|s| s.abs() <= 1.0));
        assert_eq!(out[0], 1.0);
    }
}
