use crate::utils::fine_tune;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaveformType {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl WaveformType {
    pub fn generate_sample(&self, phase: f32) -> f32 { // Phase should be in the range [0.0, 1.0)
        match self {
            WaveformType::Sine => (phase * std::f32::consts::TAU).sin(),
            WaveformType::Square => if phase < 0.5 { 1.0 } else { -1.0 },
            WaveformType::Sawtooth => phase * 2.0 - 1.0,
            WaveformType::Triangle => {
                if phase < 0.5 { phase * 4.0 - 1.0 } else { 3.0 - phase * 4.0 }
            }
        }
    }
}

/// Phase-accumulating oscillator with an automatable frequency.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: WaveformType,
    pub frequency: crate::param::Param,
    pub detune: f32, // cents
    phase: f32,
}

impl Oscillator {
    pub fn new(waveform: WaveformType, frequency: f32) -> Self {
        Oscillator {
            waveform,
            frequency: crate::param::Param::new(frequency),
            detune: 0.0,
            phase: 0.0,
        }
    }

    pub fn with_detune(mut self, cents: f32) -> Self {
        self.detune = cents;
        self
    }

    /// Frequency in Hz at `time`, detune included.
    pub fn effective_frequency(&self, time: f64) -> f32 {
        fine_tune(self.frequency.value_at(time), self.detune)
    }

    pub fn next_sample(&mut self, time: f64, sample_rate: f32) -> f32 {
        let output = self.waveform.generate_sample(self.phase);
        self.phase += self.effective_frequency(time) / sample_rate;
        self.phase -= self.phase.floor();
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveforms_stay_in_range() {
        for waveform in [WaveformType::Sine, WaveformType::Square, WaveformType::Triangle, WaveformType::Sawtooth] {
            for i in 0..1000 {
                let s = waveform.generate_sample(i as f32 / 1000.0);
                assert!((-1.0..=1.0).contains(&s), "{waveform:?} out of range: {s}");
            }
        }
    }

    #[test]
    fn sawtooth_rises_once_per_cycle() {
        assert!((WaveformType::Sawtooth.generate_sample(0.0) + 1.0).abs() < 1e-6);
        assert!(WaveformType::Sawtooth.generate_sample(0.5).abs() < 1e-6);
        assert!((WaveformType::Sawtooth.generate_sample(0.999) - 0.998).abs() < 1e-3);
    }

    #[test]
    fn detune_of_an_octave_doubles_frequency() {
        let osc = Oscillator::new(WaveformType::Sawtooth, 220.0).with_detune(1200.0);
        assert!((osc.effective_frequency(0.0) - 440.0).abs() < 1e-3);
    }

    #[test]
    fn sine_completes_cycle_at_frequency() {
        let mut osc = Oscillator::new(WaveformType::Sine, 100.0);
        let sr = 1000.0;
        let first = osc.next_sample(0.0, sr);
        for i in 1..10 {
            osc.next_sample(i as f64 / sr as f64, sr);
        }
        // 10 samples at 100 Hz / 1 kHz is one full period
        let again = osc.next_sample(0.01, sr);
        assert!((first - again).abs() < 1e-4);
    }
}
