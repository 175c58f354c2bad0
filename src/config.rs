//! Configuration struct (spec §6): backend tag plus device name and the
//! generator's initial parameter set.

use crate::consts::*;
use crate::error::{CwError, CwResult};
use crate::slope::SlopeShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    None,
    Null,
    Console,
    Oss,
    Alsa,
    PulseAudio,
    /// Umbrella tag; rejected if opened directly (see `sink::resolve_device_name`).
    Soundcard,
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub backend: Backend,
    pub device_name: String,
    pub send_speed_wpm: u32,
    pub frequency_hz: u32,
    pub volume_percent: u32,
    pub gap_units: u32,
    pub weighting_percent: u32,
    pub slope_shape: SlopeShape,
    pub slope_duration_us: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            backend: Backend::Null,
            device_name: String::new(),
            send_speed_wpm: SPEED_INITIAL,
            frequency_hz: FREQ_INITIAL,
            volume_percent: VOLUME_INITIAL,
            gap_units: GAP_INITIAL,
            weighting_percent: WEIGHTING_INITIAL,
            slope_shape: SlopeShape::RaisedCosine,
            slope_duration_us: SLOPE_DURATION_INITIAL_US,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> CwResult<()> {
        check_range("send_speed", self.send_speed_wpm, SPEED_MIN, SPEED_MAX)?;
        check_range("frequency", self.frequency_hz, FREQ_MIN, FREQ_MAX)?;
        check_range("volume", self.volume_percent, VOLUME_MIN, VOLUME_MAX)?;
        check_range("gap", self.gap_units, GAP_MIN, GAP_MAX)?;
        check_range("weighting", self.weighting_percent, WEIGHTING_MIN, WEIGHTING_MAX)?;
        if self.backend == Backend::Soundcard {
            return Err(CwError::invalid_argument(
                "'Soundcard' is an umbrella backend and cannot be selected directly",
            ));
        }
        Ok(())
    }
}

fn check_range(name: &str, value: u32, min: u32, max: u32) -> CwResult<()> {
    if value < min || value > max {
        return Err(CwError::invalid_argument(format!(
            "{name} = {value} out of range [{min}, {max}]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(GeneratorConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_soundcard_backend() {
        let mut c = GeneratorConfig::default();
        c.backend = Backend::Soundcard;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_speed() {
        let mut c = GeneratorConfig::default();
        c.send_speed_wpm = SPEED_MAX + 1;
        assert!(c.validate().is_err());
    }
}
