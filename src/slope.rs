//! Slope/amplitude table (spec §4.4): precomputed envelope samples shared
//! by every tone's rising and falling ramp.

use crate::error::{CwError, CwResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlopeShape {
    Linear,
    Sine,
    RaisedCosine,
    Rectangular,
}

#[derive(Debug, Clone)]
pub struct SlopeTable {
    pub shape: SlopeShape,
    pub duration_us: u32,
    /// Absolute volume in `[0.0, 1.0]`, derived from the generator's
    /// volume-percent setting.
    volume: f32,
    sample_rate: u32,
    /// `amplitudes[k]` for `k` in `0..n`, ramping 0 -> volume. Reused for
    /// both the rising (iterate forward) and falling (iterate backward)
    /// edge of every tone.
    amplitudes: Vec<f32>,
}

fn sample_count(sample_rate: u32, duration_us: u32) -> usize {
    ((sample_rate as i64 / 100) * duration_us as i64 / 10000).max(0) as usize
}

fn build_amplitudes(shape: SlopeShape, n: usize, volume: f32) -> Vec<f32> {
    if n == 0 || shape == SlopeShape::Rectangular {
        return Vec::new();
    }
    let n_f = n as f64;
    (0..n)
        .map(|k| {
            let k_f = k as f64;
            let v = match shape {
                SlopeShape::Linear => k_f / n_f,
                SlopeShape::Sine => (k_f * std::f64::consts::PI / 2.0 / n_f).sin(),
                SlopeShape::RaisedCosine => 1.0 - (1.0 + (k_f * std::f64::consts::PI / n_f).cos()) / 2.0,
                SlopeShape::Rectangular => unreachable!(),
            };
            (volume as f64 * v) as f32
        })
        .collect()
}

impl SlopeTable {
    pub fn new(shape: SlopeShape, duration_us: u32, volume_percent: u32, sample_rate: u32) -> Self {
        let volume = volume_percent as f32 / 100.0;
        let duration_us = if shape == SlopeShape::Rectangular { 0 } else { duration_us };
        let n = sample_count(sample_rate, duration_us);
        SlopeTable {
            shape,
            duration_us,
            volume,
            sample_rate,
            amplitudes: build_amplitudes(shape, n, volume),
        }
    }

    pub fn n_samples(&self) -> usize {
        self.amplitudes.len()
    }

    pub fn amplitude_at(&self, k: usize) -> f32 {
        self.amplitudes.get(k).copied().unwrap_or(0.0)
    }

    /// The plateau amplitude a tone sits at once past its rising slope and
    /// before its falling slope.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume_percent(&mut self, volume_percent: u32) {
        self.volume = volume_percent as f32 / 100.0;
        let n = self.amplitudes.len();
        self.amplitudes = build_amplitudes(self.shape, n, self.volume);
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.sample_rate {
            return;
        }
        self.sample_rate = sample_rate;
        let n = sample_count(sample_rate, self.duration_us);
        if n != self.amplitudes.len() {
            self.amplitudes = build_amplitudes(self.shape, n, self.volume);
        }
    }

    /// Mirrors libcw's `cw_gen_set_tone_slope`: `None` for either argument
    /// means "no change to that field" (the C `-1` sentinel). Rejects a
    /// rectangular shape paired with an explicit nonzero duration; any
    /// other combination that *results* in rectangular forces the
    /// duration to zero.
    pub fn set_tone_slope(
        &mut self,
        shape: Option<SlopeShape>,
        duration_us: Option<u32>,
    ) -> CwResult<()> {
        if shape.is_none() && duration_us.is_none() {
            return Ok(());
        }
        if let (Some(SlopeShape::Rectangular), Some(d)) = (shape, duration_us) {
            if d > 0 {
                return Err(CwError::invalid_argument(
                    "rectangular slope shape requires a zero slope duration",
                ));
            }
        }

        let new_shape = shape.unwrap_or(self.shape);
        let mut new_duration = duration_us.unwrap_or(self.duration_us);
        if new_shape == SlopeShape::Rectangular {
            new_duration = 0;
        }

        self.shape = new_shape;
        self.duration_us = new_duration;
        let n = sample_count(self.sample_rate, self.duration_us);
        self.amplitudes = build_amplitudes(self.shape, n, self.volume);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangular_forces_zero_length_table() {
        let t = SlopeTable::new(SlopeShape::Rectangular, 5000, 70, 44100);
        assert_eq!(t.n_samples(), 0);
        assert_eq!(t.duration_us, 0);
    }

    #[test]
    fn rectangular_with_nonzero_duration_is_rejected() {
        let mut t = SlopeTable::new(SlopeShape::Linear, 5000, 70, 44100);
        assert!(t
            .set_tone_slope(Some(SlopeShape::Rectangular), Some(1000))
            .is_err());
    }

    #[test]
    fn partial_update_to_rectangular_forces_duration_zero() {
        let mut t = SlopeTable::new(SlopeShape::Linear, 5000, 70, 44100);
        t.set_tone_slope(Some(SlopeShape::Rectangular), None).unwrap();
        assert_eq!(t.duration_us, 0);
        assert_eq!(t.n_samples(), 0);
    }

    #[test]
    fn no_change_sentinel_is_a_noop() {
        let mut t = SlopeTable::new(SlopeShape::Sine, 5000, 70, 44100);
        let before = t.n_samples();
        t.set_tone_slope(None, None).unwrap();
        assert_eq!(t.n_samples(), before);
    }

    #[test]
    fn linear_table_ramps_from_zero_toward_volume() {
        let t = SlopeTable::new(SlopeShape::Linear, 5000, 100, 44100);
        assert_eq!(t.amplitude_at(0), 0.0);
        assert!(t.amplitude_at(t.n_samples() - 1) < 1.0);
        assert!(t.amplitude_at(t.n_samples() - 1) > t.amplitude_at(0));
    }
}
