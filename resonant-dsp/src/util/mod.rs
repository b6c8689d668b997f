//! Math and utility layer shared by every DSP unit
//!
//! - Level conversions (dB <-> linear) and pitch conversions (MIDI, semitones)
//! - Fast trig approximations for the per-sample paths
//! - Denormal flushing for recursive filter state
//! - Easing primitives and the cross-thread parameter mailbox

mod ease;
mod params;

pub use ease::{ExponentialEase, LinearEase};
pub use params::Params;

use std::f32::consts::{LN_2, PI};

/// Smallest magnitude treated as a real signal (-120 dB)
pub const SMALL_NUMBER: f32 = 1.0e-6;

/// Floor returned by [`convert_to_decibels`] for silence
pub const MIN_DECIBELS: f32 = -120.0;

/// Flush sub-normal floats to zero.
///
/// Recursive filters decaying towards silence otherwise end up in the
/// denormal range, which is dramatically slower on most CPUs.
#[inline(always)]
pub fn underflow_clamp(x: f32) -> f32 {
    if x.abs() < f32::MIN_POSITIVE {
        0.0
    } else {
        x
    }
}

/// Convert linear amplitude to dB (floored at [`MIN_DECIBELS`])
#[inline]
pub fn convert_to_decibels(linear: f32) -> f32 {
    let linear = linear.abs();
    if linear <= SMALL_NUMBER {
        MIN_DECIBELS
    } else {
        (20.0 * linear.log10()).max(MIN_DECIBELS)
    }
}

/// Convert dB to linear amplitude
#[inline]
pub fn convert_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// MIDI note number to frequency in Hz (A4 = 69 = 440 Hz)
#[inline]
pub fn frequency_from_midi(midi_note: f32) -> f32 {
    440.0 * 2.0f32.powf((midi_note - 69.0) / 12.0)
}

/// Frequency in Hz to (fractional) MIDI note number
#[inline]
pub fn midi_from_frequency(frequency: f32) -> f32 {
    if frequency <= 0.0 {
        return 0.0;
    }
    69.0 + 12.0 * (frequency / 440.0).log2()
}

/// Frequency multiplier for a pitch offset in semitones
#[inline]
pub fn frequency_multiplier(semitones: f32) -> f32 {
    if semitones == 0.0 {
        return 1.0;
    }
    2.0f32.powf(semitones / 12.0)
}

/// Bandwidth in octaves for a given Q
#[inline]
pub fn bandwidth_from_q(q: f32) -> f32 {
    let q = q.max(SMALL_NUMBER);
    (2.0 / LN_2) * (1.0 / (2.0 * q)).asinh()
}

/// Q for a given bandwidth in octaves
#[inline]
pub fn q_from_bandwidth(bandwidth: f32) -> f32 {
    let bandwidth = bandwidth.max(SMALL_NUMBER);
    1.0 / (2.0 * (0.5 * LN_2 * bandwidth).sinh())
}

/// Map a linear control value onto a logarithmic frequency range.
///
/// `value` is clamped to `domain` first, so the result always lies in `range`.
#[inline]
pub fn log_frequency_clamped(value: f32, domain: (f32, f32), range: (f32, f32)) -> f32 {
    let (d0, d1) = domain;
    let span = d1 - d0;
    if span.abs() <= f32::EPSILON {
        return range.0;
    }
    let t = ((value.clamp(d0.min(d1), d0.max(d1)) - d0) / span).clamp(0.0, 1.0);
    let log_lo = range.0.max(SMALL_NUMBER).ln();
    let log_hi = range.1.max(SMALL_NUMBER).ln();
    (log_lo + t * (log_hi - log_lo)).exp()
}

/// Equal-power pan law. `pan` in [-1, 1] (left to right) -> (left, right) gains
#[inline]
pub fn stereo_pan(pan: f32) -> (f32, f32) {
    let p = 0.5 * (pan.clamp(-1.0, 1.0) + 1.0);
    let angle = 0.5 * PI * p;
    (angle.cos(), angle.sin())
}

/// Unipolar [0, 1] to bipolar [-1, 1]
#[inline(always)]
pub fn bipolar(x: f32) -> f32 {
    2.0 * x - 1.0
}

/// Bipolar [-1, 1] to unipolar [0, 1]
#[inline(always)]
pub fn unipolar(x: f32) -> f32 {
    0.5 * x + 0.5
}

#[inline(always)]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Parabolic sine approximation, valid for x in [-PI, PI]
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    const B: f32 = 4.0 / PI;
    const C: f32 = -4.0 / (PI * PI);
    B * x + C * x * x.abs()
}

/// Parabolic sine with one refinement pass (max error ~0.001), x in [-PI, PI]
#[inline]
pub fn fast_sin_precise(x: f32) -> f32 {
    const P: f32 = 0.225;
    let y = fast_sin(x);
    P * (y * y.abs() - y) + y
}

/// Fast tanh approximation (no libm dependency)
/// Uses rational function: x * (27 + x²) / (27 + 9x²)
#[inline]
pub fn fast_tanh(x: f32) -> f32 {
    if x >= 3.0 {
        return 1.0;
    }
    if x <= -3.0 {
        return -1.0;
    }
    let x2 = x * x;
    x * (27.0 + x2) / (27.0 + 9.0 * x2)
}

/// Pade approximation of tan, accurate for x in [0, PI/2)
#[inline]
pub fn fast_tan(x: f32) -> f32 {
    let x2 = x * x;
    let num = x * (-135_135.0 + x2 * (17_325.0 + x2 * (-378.0 + x2)));
    let den = -135_135.0 + x2 * (62_370.0 + x2 * (-3_150.0 + 28.0 * x2));
    num / den
}

/// Polynomial band-limited step correction (PolyBLEP).
///
/// `t` is the oscillator phase in [0, 1), `dt` the phase increment.
/// Returns the residual to subtract from a naive discontinuous waveform.
#[inline]
pub fn poly_smooth(t: f32, dt: f32) -> f32 {
    let dt = dt.abs();
    if dt <= 0.0 {
        return 0.0;
    }
    if t < dt {
        let t = t / dt;
        t + t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}

/// Second-order Lagrange interpolation through two points.
///
/// With two points this degenerates to the straight line through them, which
/// is what the dynamics processor uses to blend its slope across the knee.
#[inline]
pub fn lagrange_interpolation(points: &[(f32, f32); 2], x: f32) -> f32 {
    let (x0, y0) = points[0];
    let (x1, y1) = points[1];
    if (x1 - x0).abs() <= f32::EPSILON {
        return y0;
    }
    let l0 = (x - x1) / (x0 - x1);
    let l1 = (x - x0) / (x1 - x0);
    y0 * l0 + y1 * l1
}

/// Convert a time in milliseconds to a (fractional) number of samples
#[inline]
pub fn msec_to_samples(msec: f32, sample_rate: f32) -> f32 {
    msec * 0.001 * sample_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decibel_conversions() {
        assert!((convert_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((convert_to_linear(-6.0206) - 0.5).abs() < 1e-4);
        assert!((convert_to_decibels(0.5) + 6.0206).abs() < 1e-3);
        assert_eq!(convert_to_decibels(0.0), MIN_DECIBELS);
    }

    #[test]
    fn test_midi_frequency() {
        assert!((frequency_from_midi(69.0) - 440.0).abs() < 1e-3);
        assert!((frequency_from_midi(81.0) - 880.0).abs() < 1e-2);
        assert!((midi_from_frequency(261.6256) - 60.0).abs() < 1e-3);
        assert!((frequency_multiplier(12.0) - 2.0).abs() < 1e-5);
        assert_eq!(frequency_multiplier(0.0), 1.0);
    }

    #[test]
    fn test_q_bandwidth_round_trip() {
        let q = 2.5;
        let bw = bandwidth_from_q(q);
        assert!((q_from_bandwidth(bw) - q).abs() < 1e-3);
        // Q of sqrt(2) is one octave
        assert!((bandwidth_from_q(std::f32::consts::SQRT_2) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_fast_sin_accuracy() {
        for i in -100..=100 {
            let x = i as f32 / 100.0 * PI;
            assert!((fast_sin(x) - x.sin()).abs() < 0.06);
            assert!((fast_sin_precise(x) - x.sin()).abs() < 0.002);
        }
    }

    #[test]
    fn test_fast_tanh() {
        assert!((fast_tanh(0.0) - 0.0).abs() < 0.01);
        assert!((fast_tanh(1.0) - 0.7615941).abs() < 0.05);
        assert!((fast_tanh(-1.0) - (-0.7615941)).abs() < 0.05);
        assert_eq!(fast_tanh(10.0), 1.0);
    }

    #[test]
    fn test_fast_tan() {
        for i in 0..15 {
            let x = i as f32 * 0.1;
            assert!((fast_tan(x) - x.tan()).abs() < 1e-3 * x.tan().abs().max(1.0));
        }
    }

    #[test]
    fn test_stereo_pan_equal_power() {
        let (l, r) = stereo_pan(0.0);
        assert!((l - r).abs() < 1e-6);
        assert!((l * l + r * r - 1.0).abs() < 1e-5);
        let (l, r) = stereo_pan(-1.0);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
    }

    #[test]
    fn test_underflow_clamp() {
        assert_eq!(underflow_clamp(1.0e-40), 0.0);
        assert_eq!(underflow_clamp(-1.0e-40), 0.0);
        assert_eq!(underflow_clamp(0.25), 0.25);
    }

    #[test]
    fn test_log_frequency_clamped() {
        let lo = log_frequency_clamped(0.0, (0.0, 1.0), (20.0, 20000.0));
        let hi = log_frequency_clamped(1.0, (0.0, 1.0), (20.0, 20000.0));
        let mid = log_frequency_clamped(0.5, (0.0, 1.0), (20.0, 20000.0));
        assert!((lo - 20.0).abs() < 1e-2);
        assert!((hi - 20000.0).abs() < 1.0);
        // Geometric mean
        assert!((mid - 632.455).abs() < 0.5);
        // Out-of-domain values are clamped
        assert!((log_frequency_clamped(4.0, (0.0, 1.0), (20.0, 20000.0)) - hi).abs() < 1.0);
    }

    #[test]
    fn test_poly_smooth_only_near_edges() {
        let dt = 0.01;
        assert_eq!(poly_smooth(0.5, dt), 0.0);
        assert!(poly_smooth(0.001, dt) < 0.0);
        assert!(poly_smooth(0.999, dt) > 0.0);
    }

    #[test]
    fn test_lagrange_line() {
        let pts = [(-10.0, 0.0), (-2.0, 0.5)];
        assert!((lagrange_interpolation(&pts, -10.0) - 0.0).abs() < 1e-6);
        assert!((lagrange_interpolation(&pts, -2.0) - 0.5).abs() < 1e-6);
        assert!((lagrange_interpolation(&pts, -6.0) - 0.25).abs() < 1e-6);
    }
}
