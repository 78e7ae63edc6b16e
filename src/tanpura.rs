use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::effects::WaveShaper;
use crate::error::SynthError;
use crate::graph::{BufferPlayer, Source, Voice};
use crate::instrument::InstrumentSource;
use crate::param::Param;
use crate::waveform::{Oscillator, WaveformType};

/// Share of the master volume each drone strategy plays at.
pub const SAMPLE_LEVEL: f32 = 1.0;
pub const SYNTH_LEVEL: f32 = 0.1;

const FADE_IN_SECS: f64 = 1.0;

/// Which string the drone emphasises besides Sa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TanpuraString {
    #[default]
    Sa,
    Pa,
}

impl TanpuraString {
    /// Interval above the tonic the synthetic drone sounds at.
    pub fn ratio(&self) -> f32 {
        match self {
            TanpuraString::Sa => 1.0,
            TanpuraString::Pa => 1.5,
        }
    }
}

impl fmt::Display for TanpuraString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TanpuraString::Sa => write!(f, "Sa"),
            TanpuraString::Pa => write!(f, "Pa"),
        }
    }
}

impl FromStr for TanpuraString {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sa" => Ok(TanpuraString::Sa),
            "pa" => Ok(TanpuraString::Pa),
            other => Err(SynthError::ParseError(format!("Unknown tanpura string: {other}"))),
        }
    }
}

/// A drone voice and the share of master volume it was built at.
pub struct Drone {
    pub voice: Voice,
    pub level: f32,
}

pub struct DroneSettings<'a> {
    pub reference_hz: f32,
    pub jivari: Option<&'a Arc<[f32]>>,
}

/// Build the looping drone for `base_freq`.
///
/// Recordings are rate-shifted from their reference pitch and fade in over a
/// second. The synthetic drone is a single sawtooth, optionally through the
/// jivari curve.
pub fn drone(
    string: TanpuraString,
    base_freq: f32,
    source: InstrumentSource,
    now: f64,
    volume: f32,
    settings: &DroneSettings,
) -> Result<Drone, SynthError> {
    if !base_freq.is_finite() || base_freq <= 0.0 {
        return Err(SynthError::ParseError(format!("Invalid tanpura frequency: {base_freq}")));
    }

    match source {
        InstrumentSource::Sample(data) => {
            let rate = base_freq / settings.reference_hz;
            let mut gain = Param::new(0.0);
            gain.set_value_at_time(0.0, now)
                .linear_ramp_to_value_at_time(volume * SAMPLE_LEVEL, now + FADE_IN_SECS);
            let voice = Voice::new(Source::Buffer(BufferPlayer::new(data, rate, true)), now).with_gain(gain);
            Ok(Drone { voice, level: SAMPLE_LEVEL })
        }
        InstrumentSource::Synthesized => {
            let osc = Oscillator::new(WaveformType::Sawtooth, base_freq * string.ratio());
            let mut voice = Voice::new(Source::Oscillators(vec![osc]), now)
                .with_gain(Param::new(volume * SYNTH_LEVEL));
            if let Some(curve) = settings.jivari {
                voice = voice.with_shaper(WaveShaper::new(Arc::clone(curve)));
            }
            Ok(Drone { voice, level: SYNTH_LEVEL })
        }
    }
}
