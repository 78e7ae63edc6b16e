//! Tabla bols and their synthesized strokes.
//!
//! A bol is the spoken syllable of a tabla stroke. Each one resolves to a hit
//! on the treble drum (dayan), the bass drum (bayan), or both at once.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::effects::BiquadFilter;
use crate::error::SynthError;
use crate::graph::{BufferPlayer, Source, Voice};
use crate::instrument::SampleData;
use crate::param::Param;
use crate::waveform::{Oscillator, WaveformType};

/// Fundamental of the synthesized dayan head (C#4).
pub const DAYAN_FUNDAMENTAL_HZ: f32 = 277.18;
pub const BAYAN_BASE_HZ: f32 = 85.0;

const NOISE_CUTOFF_HZ: f32 = 2000.0;
const BAYAN_CUTOFF_HZ: f32 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bol {
    Dha,
    Dhin,
    Na,
    Tin,
    Ta,
    Ge,
    Ka,
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayanStroke {
    Na,
    Tin,
    Ta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BayanProfile {
    Flat,
    Gumki,     // pitch bend under the palm
    SlideDown, // ge
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stroke {
    pub dayan: Option<DayanStroke>,
    pub bayan: Option<BayanProfile>,
}

impl Bol {
    /// Case-insensitive lookup. Anything unrecognized, `-` and `none` included, is a rest.
    pub fn parse(label: &str) -> Bol {
        match label.trim().to_lowercase().as_str() {
            "dha" => Bol::Dha,
            "dhin" => Bol::Dhin,
            "na" => Bol::Na,
            "tin" | "tun" => Bol::Tin,
            "ta" => Bol::Ta,
            "ge" | "ghe" => Bol::Ge,
            "ka" | "ke" => Bol::Ka,
            "-" | "none" | "" => Bol::Rest,
            other => {
                debug!("Unrecognized bol '{}' treated as a rest", other);
                Bol::Rest
            }
        }
    }

    pub fn is_rest(&self) -> bool {
        *self == Bol::Rest
    }

    pub fn stroke(&self) -> Stroke {
        let (dayan, bayan) = match self {
            Bol::Dha => (Some(DayanStroke::Na), Some(BayanProfile::SlideDown)),
            Bol::Dhin => (Some(DayanStroke::Tin), Some(BayanProfile::Gumki)),
            Bol::Na => (Some(DayanStroke::Na), None),
            Bol::Tin => (Some(DayanStroke::Tin), None),
            Bol::Ta => (Some(DayanStroke::Ta), None),
            Bol::Ge => (None, Some(BayanProfile::SlideDown)),
            Bol::Ka => (None, Some(BayanProfile::Flat)),
            Bol::Rest => (None, None),
        };
        Stroke { dayan, bayan }
    }
}

impl FromStr for Bol {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Bol::parse(s))
    }
}

impl fmt::Display for Bol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Bol::Dha => "Dha",
            Bol::Dhin => "Dhin",
            Bol::Na => "Na",
            Bol::Tin => "Tin",
            Bol::Ta => "Ta",
            Bol::Ge => "Ge",
            Bol::Ka => "Ka",
            Bol::Rest => "-",
        };
        write!(f, "{name}")
    }
}

/// Voices for one bol starting at `now`. A rest yields nothing.
pub fn strike(bol: Bol, now: f64, volume: f32, noise: &SampleData, sample_rate: f32) -> Vec<Voice> {
    let stroke = bol.stroke();
    let mut voices = Vec::new();
    if let Some(dayan) = stroke.dayan {
        voices.extend(dayan_voices(dayan, now, volume, noise, sample_rate));
    }
    if let Some(profile) = stroke.bayan {
        voices.push(bayan_voice(profile, now, volume, sample_rate));
    }
    voices
}

/// A high-passed noise click plus three inharmonic sine modes.
pub fn dayan_voices(stroke: DayanStroke, now: f64, volume: f32, noise: &SampleData, sample_rate: f32) -> Vec<Voice> {
    let mut voices = Vec::with_capacity(4);

    let mut click_gain = Param::new(0.3 * volume);
    click_gain
        .set_value_at_time(0.3 * volume, now)
        .exponential_ramp_to_value_at_time(0.001, now + 0.05);
    voices.push(
        Voice::new(Source::Buffer(BufferPlayer::new(noise.clone(), 1.0, false)), now)
            .with_filter(BiquadFilter::highpass(NOISE_CUTOFF_HZ, sample_rate))
            .with_gain(click_gain),
    );

    let damping = if stroke == DayanStroke::Ta { 0.4 } else { 1.0 };
    let fundamental_decay = if stroke == DayanStroke::Na { 0.5 } else { 1.2 };
    let modes = [(1.0, fundamental_decay, 1.0), (2.9, 0.4, 0.3), (4.8, 0.2, 0.1)];

    for (ratio, decay, level) in modes {
        let freq = DAYAN_FUNDAMENTAL_HZ * ratio;
        let mut osc = Oscillator::new(WaveformType::Sine, freq);
        osc.frequency
            .set_value_at_time(freq, now)
            .exponential_ramp_to_value_at_time(freq * 0.99, now + 0.1);

        let peak = level * volume * damping;
        let mut gain = Param::new(peak);
        gain.set_value_at_time(peak, now)
            .exponential_ramp_to_value_at_time(0.001, now + decay);

        voices.push(
            Voice::new(Source::Oscillators(vec![osc]), now)
                .with_gain(gain)
                .stop_at(now + decay + 0.1),
        );
    }
    voices
}

/// A low-passed triangle thump with the profile's pitch contour.
pub fn bayan_voice(profile: BayanProfile, now: f64, volume: f32, sample_rate: f32) -> Voice {
    let mut osc = Oscillator::new(WaveformType::Triangle, BAYAN_BASE_HZ);
    osc.frequency.set_value_at_time(BAYAN_BASE_HZ, now);
    match profile {
        BayanProfile::Flat => {}
        BayanProfile::Gumki => {
            osc.frequency
                .set_value_at_time(BAYAN_BASE_HZ + 10.0, now)
                .linear_ramp_to_value_at_time(BAYAN_BASE_HZ - 5.0, now + 0.1)
                .linear_ramp_to_value_at_time(BAYAN_BASE_HZ + 15.0, now + 0.3);
        }
        BayanProfile::SlideDown => {
            osc.frequency
                .set_value_at_time(BAYAN_BASE_HZ + 20.0, now)
                .exponential_ramp_to_value_at_time(BAYAN_BASE_HZ, now + 0.4);
        }
    }

    let mut gain = Param::new(0.0);
    gain.set_value_at_time(0.0, now)
        .linear_ramp_to_value_at_time(volume, now + 0.02)
        .exponential_ramp_to_value_at_time(0.001, now + 0.8);

    Voice::new(Source::Oscillators(vec![osc]), now)
        .with_filter(BiquadFilter::lowpass(BAYAN_CUTOFF_HZ, sample_rate))
        .with_gain(gain)
        .stop_at(now + 1.0)
}

/// One second of uniform white noise in [-1, 1).
pub fn noise_buffer(sample_rate: u32) -> SampleData {
    let samples = (0..sample_rate).map(|_| fastrand::f32() * 2.0 - 1.0).collect();
    SampleData::new(samples, sample_rate)
}
