use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::SynthError;

/// Decoded mono PCM at its native sample rate.
#[derive(Debug, Clone)]
pub struct SampleData {
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
}

impl SampleData {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        SampleData { samples: Arc::new(samples), sample_rate }
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// How a voice makes sound, decided once when the voice is created.
#[derive(Debug, Clone)]
pub enum InstrumentSource {
    Sample(SampleData),
    Synthesized,
}

impl InstrumentSource {
    pub fn from_buffer(buffer: Option<&SampleData>) -> Self {
        match buffer {
            Some(data) if !data.is_empty() => InstrumentSource::Sample(data.clone()),
            _ => InstrumentSource::Synthesized,
        }
    }

    pub fn is_sample(&self) -> bool {
        matches!(self, InstrumentSource::Sample(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    Tanpura,
    Tabla,
    Harmonium,
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instrument::Tanpura => write!(f, "tanpura"),
            Instrument::Tabla => write!(f, "tabla"),
            Instrument::Harmonium => write!(f, "harmonium"),
        }
    }
}

impl FromStr for Instrument {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tanpura" => Ok(Instrument::Tanpura),
            "tabla" => Ok(Instrument::Tabla),
            "harmonium" => Ok(Instrument::Harmonium),
            other => Err(SynthError::InvalidInstrument(format!("Unknown instrument: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_falls_back_to_synthesis() {
        let empty = SampleData::new(Vec::new(), 44100);
        assert!(!InstrumentSource::from_buffer(Some(&empty)).is_sample());
        assert!(!InstrumentSource::from_buffer(None).is_sample());

        let loaded = SampleData::new(vec![0.1; 10], 44100);
        assert!(InstrumentSource::from_buffer(Some(&loaded)).is_sample());
    }

    #[test]
    fn instrument_names_round_trip() {
        for kind in [Instrument::Tanpura, Instrument::Tabla, Instrument::Harmonium] {
            assert_eq!(kind.to_string().parse::<Instrument>().ok(), Some(kind));
        }
        assert!(" Tabla ".parse::<Instrument>().is_ok());
        assert!("sitar".parse::<Instrument>().is_err());
    }

    #[test]
    fn duration_from_rate() {
        let data = SampleData::new(vec![0.0; 22050], 44100);
        assert!((data.duration() - 0.5).abs() < 1e-9);
    }
}
