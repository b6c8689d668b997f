//! Grain window shapes
//!
//! Every shape is precomputed into a lookup table once, so selecting a new
//! shape on the audio thread is a plain index change.

use std::f32::consts::PI;

/// Table resolution per shape (power of two)
const TABLE_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(u8)]
pub enum GrainEnvelopeType {
    #[default]
    Gaussian = 0,
    Triangle,
    DownwardTriangle,
    UpwardTriangle,
    ExponentialDecay,
    ExponentialIncrease,
    Hanning,
    Lanczos,
    Cosine,
    CosineSquared,
    Welch,
    Blackman,
    BlackmanHarris,
    Trapezoid,
}

impl GrainEnvelopeType {
    pub const COUNT: usize = 14;

    pub const ALL: [GrainEnvelopeType; Self::COUNT] = [
        Self::Gaussian,
        Self::Triangle,
        Self::DownwardTriangle,
        Self::UpwardTriangle,
        Self::ExponentialDecay,
        Self::ExponentialIncrease,
        Self::Hanning,
        Self::Lanczos,
        Self::Cosine,
        Self::CosineSquared,
        Self::Welch,
        Self::Blackman,
        Self::BlackmanHarris,
        Self::Trapezoid,
    ];

    /// Window value at `x` in [0, 1]
    fn evaluate(self, x: f32) -> f32 {
        match self {
            Self::Gaussian => {
                let sigma = 0.15;
                let d = (x - 0.5) / sigma;
                (-0.5 * d * d).exp()
            }
            Self::Triangle => 1.0 - (2.0 * x - 1.0).abs(),
            Self::DownwardTriangle => 1.0 - x,
            Self::UpwardTriangle => x,
            Self::ExponentialDecay => (-6.0 * x).exp() * (1.0 - x),
            Self::ExponentialIncrease => (-6.0 * (1.0 - x)).exp() * x,
            Self::Hanning => 0.5 * (1.0 - (2.0 * PI * x).cos()),
            Self::Lanczos => {
                let t = 2.0 * x - 1.0;
                if t.abs() < 1.0e-6 {
                    1.0
                } else {
                    (PI * t).sin() / (PI * t)
                }
            }
            Self::Cosine => (PI * x).sin(),
            Self::CosineSquared => {
                let s = (PI * x).sin();
                s * s
            }
            Self::Welch => {
                let t = 2.0 * x - 1.0;
                1.0 - t * t
            }
            Self::Blackman => 0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos(),
            Self::BlackmanHarris => {
                0.35875 - 0.48829 * (2.0 * PI * x).cos() + 0.14128 * (4.0 * PI * x).cos()
                    - 0.01168 * (6.0 * PI * x).cos()
            }
            Self::Trapezoid => {
                let ramp = 0.1;
                if x < ramp {
                    x / ramp
                } else if x > 1.0 - ramp {
                    (1.0 - x) / ramp
                } else {
                    1.0
                }
            }
        }
        .max(0.0)
    }
}

/// Shared grain window with all shapes precomputed
pub struct GrainEnvelope {
    tables: Vec<f32>,
    envelope_type: GrainEnvelopeType,
}

impl Default for GrainEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

impl GrainEnvelope {
    pub fn new() -> Self {
        let mut tables = vec![0.0; GrainEnvelopeType::COUNT * TABLE_SIZE];
        for (shape, table) in GrainEnvelopeType::ALL.iter().zip(tables.chunks_exact_mut(TABLE_SIZE)) {
            for (i, value) in table.iter_mut().enumerate() {
                *value = shape.evaluate(i as f32 / (TABLE_SIZE - 1) as f32);
            }
        }
        Self {
            tables,
            envelope_type: GrainEnvelopeType::default(),
        }
    }

    pub fn set_type(&mut self, envelope_type: GrainEnvelopeType) {
        self.envelope_type = envelope_type;
    }

    pub fn envelope_type(&self) -> GrainEnvelopeType {
        self.envelope_type
    }

    /// Interpolated window value at `fraction` of the grain's life (clamped to [0, 1])
    #[inline]
    pub fn value(&self, fraction: f32) -> f32 {
        let offset = self.envelope_type as usize * TABLE_SIZE;
        let table = &self.tables[offset..offset + TABLE_SIZE];
        let position = fraction.clamp(0.0, 1.0) * (TABLE_SIZE - 1) as f32;
        let index = position as usize;
        if index >= TABLE_SIZE - 1 {
            return table[TABLE_SIZE - 1];
        }
        let frac = position - index as f32;
        table[index] + frac * (table[index + 1] - table[index])
    }
}
