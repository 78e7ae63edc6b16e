use std::fmt;
use std::str::FromStr;

use crate::effects::BiquadFilter;
use crate::error::SynthError;
use crate::graph::{BufferPlayer, Source, Voice};
use crate::instrument::InstrumentSource;
use crate::param::Param;
use crate::waveform::{Oscillator, WaveformType};

const REED_DETUNE_CENTS: f32 = 8.0;
const REED_CUTOFF_HZ: f32 = 1500.0;

/// The thirteen keys of one harmonium octave, Sa to upper Sa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Swara {
    Sa,
    ReKomal,
    Re,
    GaKomal,
    Ga,
    Ma,
    MaTivra,
    Pa,
    DhaKomal,
    Dha,
    NiKomal,
    Ni,
    UpperSa,
}

impl Swara {
    pub const ALL: [Swara; 13] = [
        Swara::Sa,
        Swara::ReKomal,
        Swara::Re,
        Swara::GaKomal,
        Swara::Ga,
        Swara::Ma,
        Swara::MaTivra,
        Swara::Pa,
        Swara::DhaKomal,
        Swara::Dha,
        Swara::NiKomal,
        Swara::Ni,
        Swara::UpperSa,
    ];

    pub fn ratio(&self) -> f32 {
        match self {
            Swara::Sa => 1.0,
            Swara::ReKomal => 1.059,
            Swara::Re => 1.122,
            Swara::GaKomal => 1.189,
            Swara::Ga => 1.259,
            Swara::Ma => 1.334,
            Swara::MaTivra => 1.414,
            Swara::Pa => 1.498,
            Swara::DhaKomal => 1.587,
            Swara::Dha => 1.681,
            Swara::NiKomal => 1.781,
            Swara::Ni => 1.887,
            Swara::UpperSa => 2.0,
        }
    }

    pub fn indian_name(&self) -> &'static str {
        match self {
            Swara::Sa => "Sa",
            Swara::ReKomal => "re Komal",
            Swara::Re => "re",
            Swara::GaKomal => "ga Komal",
            Swara::Ga => "ga",
            Swara::Ma => "ma",
            Swara::MaTivra => "ma Tivra",
            Swara::Pa => "Pa",
            Swara::DhaKomal => "dha Komal",
            Swara::Dha => "dha",
            Swara::NiKomal => "ni Komal",
            Swara::Ni => "ni",
            Swara::UpperSa => "Sa (Hi)",
        }
    }

    /// Key name used for harmonium recordings.
    pub fn western_name(&self) -> &'static str {
        match self {
            Swara::Sa => "C",
            Swara::ReKomal => "Db",
            Swara::Re => "D",
            Swara::GaKomal => "Eb",
            Swara::Ga => "E",
            Swara::Ma => "F",
            Swara::MaTivra => "F#",
            Swara::Pa => "G",
            Swara::DhaKomal => "Ab",
            Swara::Dha => "A",
            Swara::NiKomal => "Bb",
            Swara::Ni => "B",
            Swara::UpperSa => "C5",
        }
    }

    pub fn frequency(&self, sa_hz: f32) -> f32 {
        sa_hz * self.ratio()
    }
}

impl fmt::Display for Swara {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.indian_name())
    }
}

impl FromStr for Swara {
    type Err = SynthError;

    /// Accepts either the Indian or the Western name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Swara::ALL
            .iter()
            .copied()
            .find(|sw| sw.indian_name().eq_ignore_ascii_case(s) || sw.western_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SynthError::ParseError(format!("Unknown swara: {s}")))
    }
}

/// One key press. Samples play at their recorded pitch with a four second
/// decay; the synthesized reed is a detuned sawtooth pair through a low-pass.
pub fn key_voice(freq: f32, source: InstrumentSource, now: f64, volume: f32, sample_rate: f32) -> Result<Voice, SynthError> {
    match source {
        InstrumentSource::Sample(data) => {
            let peak = 0.6 * volume;
            let mut gain = Param::new(peak);
            gain.set_value_at_time(peak, now)
                .exponential_ramp_to_value_at_time(0.01, now + 4.0);
            Ok(Voice::new(Source::Buffer(BufferPlayer::new(data, 1.0, false)), now).with_gain(gain))
        }
        InstrumentSource::Synthesized => {
            if !freq.is_finite() || freq <= 0.0 {
                return Err(SynthError::ParseError(format!("Invalid harmonium frequency: {freq}")));
            }
            let reeds = vec![
                Oscillator::new(WaveformType::Sawtooth, freq),
                Oscillator::new(WaveformType::Sawtooth, freq).with_detune(REED_DETUNE_CENTS),
            ];

            let sustain = 0.2 * volume;
            let mut gain = Param::new(0.0);
            gain.set_value_at_time(0.0, now)
                .linear_ramp_to_value_at_time(sustain, now + 0.1)
                .set_value_at_time(sustain, now + 0.5)
                .exponential_ramp_to_value_at_time(0.001, now + 3.0);

            Ok(Voice::new(Source::Oscillators(reeds), now)
                .with_filter(BiquadFilter::lowpass(REED_CUTOFF_HZ, sample_rate))
                .with_gain(gain)
                .stop_at(now + 3.1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::SampleData;

    #[test]
    fn swara_table() {
        assert_eq!(Swara::ALL.len(), 13);
        assert_eq!(Swara::Pa.frequency(200.0), 200.0 * 1.498);
        assert_eq!(Swara::UpperSa.frequency(146.83), 293.66);
        assert!(Swara::ALL.windows(2).all(|w| w[0].ratio() < w[1].ratio()));
    }

    #[test]
    fn swara_names_parse() {
        assert_eq!("ma Tivra".parse::<Swara>().ok(), Some(Swara::MaTivra));
        assert_eq!("Bb".parse::<Swara>().ok(), Some(Swara::NiKomal));
        assert_eq!("c5".parse::<Swara>().ok(), Some(Swara::UpperSa));
        assert!("Sha".parse::<Swara>().is_err());
    }

    #[test]
    fn synthesized_reed_envelope() {
        let voice = key_voice(261.63, InstrumentSource::Synthesized, 1.0, 0.5, 44100.0).expect("voice");
        let reeds = voice.oscillators();
        assert_eq!(reeds.len(), 2);
        assert_eq!(reeds[1].detune, 8.0);
        assert!(voice.filter.is_some());

        let g = &voice.gain;
        assert_eq!(g.value_at(1.0), 0.0);
        assert!((g.value_at(1.1) - 0.1).abs() < 1e-6);
        assert!((g.value_at(1.3) - 0.1).abs() < 1e-6);
        assert!((g.value_at(4.0) - 0.001).abs() < 1e-6);
        assert!(voice.stop_time.is_some_and(|t| (t - 4.1).abs() < 1e-9));
    }

    #[test]
    fn sampled_key_decays_over_four_seconds() {
        let data = SampleData::new(vec![0.2; 1000], 44100);
        let voice = key_voice(261.63, InstrumentSource::Sample(data), 0.0, 0.5, 44100.0).expect("voice");
        let player = voice.buffer().expect("buffer");
        assert_eq!(player.playback_rate, 1.0);
        assert!(!player.looping);
        assert!((voice.gain.value_at(0.0) - 0.3).abs() < 1e-6);
        assert!((voice.gain.value_at(4.0) - 0.01).abs() < 1e-6);
    }

    #[test]
    fn synthesized_key_rejects_bad_frequency() {
        assert!(key_voice(-1.0, InstrumentSource::Synthesized, 0.0, 0.5, 44100.0).is_err());
    }
}
