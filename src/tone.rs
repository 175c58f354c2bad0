//! The `Tone` descriptor enqueued onto a `ToneQueue` (spec §3).

use crate::consts::FREQ_MAX;
use crate::error::{CwError, CwResult};

/// Which edges of a tone get slope (envelope ramp) treatment. Distinct
/// from the *shape* a slope is rendered with (`slope::SlopeShape`), which
/// is a generator-wide setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlopeMode {
    NoSlopes,
    RisingOnly,
    FallingOnly,
    Standard,
}

/// A "hold this value until told otherwise" tone used for straight-key
/// down/up events. Re-played by the queue in fixed-size quanta rather than
/// consumed, until displaced by a newer tone or cancelled by silencing.
pub const FOREVER_TONE_QUANTUM_US: i64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Hz; 0 means silence.
    pub frequency: u32,
    /// Microseconds.
    pub duration_us: i64,
    pub slope_mode: SlopeMode,
    pub is_forever: bool,
    /// True for the tone that opens a character (mark or leading space);
    /// used by `remove_last_character` to find the start of the last
    /// enqueued character.
    pub is_first_of_character: bool,
}

impl Tone {
    pub fn new(frequency: u32, duration_us: i64, slope_mode: SlopeMode) -> CwResult<Self> {
        let t = Tone {
            frequency,
            duration_us,
            slope_mode,
            is_forever: false,
            is_first_of_character: false,
        };
        t.validate()?;
        Ok(t)
    }

    pub fn forever(frequency: u32, slope_mode: SlopeMode) -> CwResult<Self> {
        let t = Tone {
            frequency,
            duration_us: FOREVER_TONE_QUANTUM_US,
            slope_mode,
            is_forever: true,
            is_first_of_character: false,
        };
        t.validate()?;
        Ok(t)
    }

    pub fn first_of_character(mut self) -> Self {
        self.is_first_of_character = true;
        self
    }

    pub fn is_silent(&self) -> bool {
        self.frequency == 0 || self.duration_us == 0
    }

    pub fn validate(&self) -> CwResult<()> {
        if self.duration_us < 0 {
            return Err(CwError::invalid_argument(format!(
                "tone duration must be >= 0, got {}",
                self.duration_us
            )));
        }
        if self.frequency > FREQ_MAX {
            return Err(CwError::invalid_argument(format!(
                "tone frequency {} exceeds FREQ_MAX {}",
                self.frequency, FREQ_MAX
            )));
        }
        if self.is_forever && self.duration_us != FOREVER_TONE_QUANTUM_US {
            return Err(CwError::invalid_argument(
                "a forever tone's duration must equal the forever quantum",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_duration() {
        assert!(Tone::new(400, -1, SlopeMode::Standard).is_err());
    }

    #[test]
    fn rejects_out_of_range_frequency() {
        assert!(Tone::new(FREQ_MAX + 1, 100, SlopeMode::Standard).is_err());
    }

    #[test]
    fn zero_frequency_is_silence() {
        let t = Tone::new(0, 100, SlopeMode::NoSlopes).unwrap();
        assert!(t.is_silent());
    }

    #[test]
    fn forever_tone_has_quantum_duration() {
        let t = Tone::forever(600, SlopeMode::RisingOnly).unwrap();
        assert_eq!(t.duration_us, FOREVER_TONE_QUANTUM_US);
        assert!(t.is_forever);
    }
}
