use std::sync::Arc;

pub const JIVARI_CURVE_LEN: usize = 65536;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    LowPass,
    HighPass,
}

/// Second order IIR filter, Direct Form II Transposed with cookbook coefficients.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    pub filter_type: FilterType,
    pub cutoff: f32, // Hz
    pub q: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl BiquadFilter {
    pub fn new(filter_type: FilterType, cutoff: f32, sample_rate: f32) -> Self {
        let mut filter = BiquadFilter {
            filter_type,
            cutoff,
            q: std::f32::consts::FRAC_1_SQRT_2,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        };
        filter.update_coefficients(sample_rate);
        filter
    }

    pub fn lowpass(cutoff: f32, sample_rate: f32) -> Self {
        Self::new(FilterType::LowPass, cutoff, sample_rate)
    }

    pub fn highpass(cutoff: f32, sample_rate: f32) -> Self {
        Self::new(FilterType::HighPass, cutoff, sample_rate)
    }

    pub fn update_coefficients(&mut self, sample_rate: f32) {
        // Keep the cutoff below Nyquist or the coefficients blow up
        let cutoff = self.cutoff.clamp(1.0, sample_rate * 0.49);
        let omega = std::f32::consts::TAU * cutoff / sample_rate;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * self.q);

        let (b0, b1, b2, a0, a1, a2) = match self.filter_type {
            FilterType::LowPass => (
                (1.0 - cos_omega) / 2.0,
                1.0 - cos_omega,
                (1.0 - cos_omega) / 2.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterType::HighPass => (
                (1.0 + cos_omega) / 2.0,
                -(1.0 + cos_omega),
                (1.0 + cos_omega) / 2.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }
}

/// Static transfer curve lookup, input in [-1, 1] mapped across the curve.
#[derive(Debug, Clone)]
pub struct WaveShaper {
    curve: Arc<[f32]>,
}

impl WaveShaper {
    pub fn new(curve: Arc<[f32]>) -> Self {
        WaveShaper { curve }
    }

    pub fn process(&self, input: f32) -> f32 {
        let n = self.curve.len();
        match n {
            0 => input,
            1 => self.curve[0],
            _ => {
                let pos = (input.clamp(-1.0, 1.0) + 1.0) * 0.5 * (n - 1) as f32;
                let idx = pos as usize;
                if idx >= n - 1 {
                    return self.curve[n - 1];
                }
                let frac = pos - idx as f32;
                self.curve[idx] * (1.0 - frac) + self.curve[idx + 1] * frac
            }
        }
    }
}

/// Buzzing bridge ("jivari") saturation of a plucked string.
pub fn jivari_curve() -> Arc<[f32]> {
    (0..JIVARI_CURVE_LEN)
        .map(|i| {
            let x = (i * 2) as f32 / JIVARI_CURVE_LEN as f32 - 1.0;
            (x * 3.0).tanh() * (1.0 - 0.2 * (x * std::f32::consts::PI).sin())
        })
        .collect()
}
