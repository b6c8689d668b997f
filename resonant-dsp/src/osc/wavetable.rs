//! Single-cycle wavetable oscillator

use std::f32::consts::PI;

use super::OscBase;
use crate::modulation::{ModulationMatrix, VoiceId};
use crate::util::lerp;

/// Samples per cycle
pub const WAVE_TABLE_SIZE: usize = 1024;

/// Harmonics summed by the band-limited tables
const NUM_HARMONICS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveTableType {
    #[default]
    Sine,
    Saw,
    Triangle,
    Square,
    BandLimitedSaw,
    BandLimitedTriangle,
    BandLimitedSquare,
    /// Caller-filled table, see [`WaveTableOsc::table_mut`]
    Custom,
}

/// Table lookup oscillator with linear interpolation
#[derive(Debug, Clone)]
pub struct WaveTableOsc {
    pub base: OscBase,
    table_type: WaveTableType,
    table: Vec<f32>,
    scale: f32,
    add: f32,
}

impl WaveTableOsc {
    pub fn new(sample_rate: f32, table_type: WaveTableType) -> Self {
        let mut osc = Self {
            base: OscBase::new(sample_rate),
            table_type,
            table: vec![0.0; WAVE_TABLE_SIZE],
            scale: 1.0,
            add: 0.0,
        };
        osc.fill_table();
        osc
    }

    pub fn init(&mut self, sample_rate: f32, voice_id: VoiceId, mod_matrix: Option<&mut ModulationMatrix>) {
        self.base.init(sample_rate, voice_id, mod_matrix);
    }

    /// Select a table shape (regenerates the table unless Custom)
    pub fn set_type(&mut self, table_type: WaveTableType) {
        if table_type != self.table_type {
            self.table_type = table_type;
            self.fill_table();
        }
    }

    pub fn table_type(&self) -> WaveTableType {
        self.table_type
    }

    pub fn table(&self) -> &[f32] {
        &self.table
    }

    /// Writable table; switches the oscillator to `Custom`
    pub fn table_mut(&mut self) -> &mut [f32] {
        self.table_type = WaveTableType::Custom;
        &mut self.table
    }

    /// Output = table * scale + add
    pub fn set_scale_add(&mut self, scale: f32, add: f32) {
        self.scale = scale;
        self.add = add;
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.base.set_frequency(frequency);
    }

    pub fn update(&mut self, mod_matrix: Option<&ModulationMatrix>) {
        self.base.update(mod_matrix);
    }

    pub fn start(&mut self) {
        self.base.start();
    }

    pub fn stop(&mut self) {
        self.base.stop();
    }

    fn fill_table(&mut self) {
        let n = WAVE_TABLE_SIZE as f32;
        let table_type = self.table_type;
        if table_type == WaveTableType::Custom {
            return;
        }

        for (i, sample) in self.table.iter_mut().enumerate() {
            let phase = i as f32 / n;
            *sample = match table_type {
                WaveTableType::Sine => (2.0 * PI * phase).sin(),
                WaveTableType::Saw => 2.0 * phase - 1.0,
                WaveTableType::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
                WaveTableType::Square => {
                    if phase < 0.5 {
                        1.0
                    } else {
                        -1.0
                    }
                }
                WaveTableType::BandLimitedSaw => (1..=NUM_HARMONICS)
                    .map(|k| (2.0 * PI * k as f32 * phase).sin() / k as f32)
                    .sum(),
                WaveTableType::BandLimitedSquare => (1..=NUM_HARMONICS)
                    .step_by(2)
                    .map(|k| (2.0 * PI * k as f32 * phase).sin() / k as f32)
                    .sum(),
                WaveTableType::BandLimitedTriangle => (1..=NUM_HARMONICS)
                    .step_by(2)
                    .enumerate()
                    .map(|(i, k)| {
                        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                        sign * (2.0 * PI * k as f32 * phase).sin() / (k * k) as f32
                    })
                    .sum(),
                WaveTableType::Custom => 0.0,
            };
        }

        if matches!(
            table_type,
            WaveTableType::BandLimitedSaw | WaveTableType::BandLimitedSquare | WaveTableType::BandLimitedTriangle
        ) {
            let peak = self.table.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            if peak > 0.0 {
                for sample in &mut self.table {
                    *sample /= peak;
                }
            }
        }
    }

    #[inline]
    fn read(&self, phase: f32) -> f32 {
        let position = phase * WAVE_TABLE_SIZE as f32;
        let index = (position as usize) % WAVE_TABLE_SIZE;
        let next = (index + 1) % WAVE_TABLE_SIZE;
        lerp(self.table[index], self.table[next], position.fract())
    }

    /// Advance one sample and return (output, quadrature output)
    pub fn generate_with_quad(&mut self) -> (f32, f32) {
        if !self.base.is_playing() {
            return (0.0, 0.0);
        }
        let phase = self.base.phase();
        let gain = self.base.output_gain() * self.scale;
        let out = self.read(phase) * gain + self.add;
        let quad = self.read((phase + 0.25).fract()) * gain + self.add;
        self.base.update_phase();
        (out, quad)
    }

    #[inline]
    pub fn generate(&mut self) -> f32 {
        self.generate_with_quad().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_limited_tables_peak_at_one() {
        for table_type in [
            WaveTableType::BandLimitedSaw,
            WaveTableType::BandLimitedSquare,
            WaveTableType::BandLimitedTriangle,
        ] {
            let osc = WaveTableOsc::new(48000.0, table_type);
            let peak = osc.table().iter().fold(0.0f32, |m, s| m.max(s.abs()));
            assert!((peak - 1.0).abs() < 1e-6, "{:?} peak {}", table_type, peak);
        }
    }

    #[test]
    fn test_interpolated_read_tracks_sine() {
        let mut osc = WaveTableOsc::new(48000.0, WaveTableType::Sine);
        osc.set_frequency(440.0);
        osc.update(None);
        osc.start();
        for n in 0..1000 {
            let expected = (2.0 * PI * 440.0 * n as f32 / 48000.0).sin();
            assert!((osc.generate() - expected).abs() < 1e-3);
        }
    }

    #[test]
    fn test_scale_add_and_quadrature() {
        let mut osc = WaveTableOsc::new(48000.0, WaveTableType::Sine);
        osc.set_scale_add(0.5, 0.5);
        osc.update(None);
        osc.start();
        let (out, quad) = osc.generate_with_quad();
        assert!((out - 0.5).abs() < 1e-6);
        assert!((quad - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_custom_table() {
        let mut osc = WaveTableOsc::new(48000.0, WaveTableType::Saw);
        osc.table_mut().fill(0.25);
        assert_eq!(osc.table_type(), WaveTableType::Custom);
        osc.update(None);
        osc.start();
        assert_eq!(osc.generate(), 0.25);
    }
}
