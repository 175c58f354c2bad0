//! Numeric limits and calibration constants, grounded in the `CW_*_MIN` /
//! `CW_*_MAX` / `CW_*_INITIAL` constants referenced throughout
//! `examples/original_source/src/libcw/libcw_gen.c` and `libcw_rec.c`.

/// PARIS calibration: "PARIS " at 1 wpm takes 1,200,000 microseconds, so
/// `unit_us = CAL / wpm`.
pub const CAL: i64 = 1_200_000;

pub const SPEED_MIN: u32 = 4;
pub const SPEED_MAX: u32 = 60;
pub const SPEED_INITIAL: u32 = 12;

pub const FREQ_MIN: u32 = 0;
pub const FREQ_MAX: u32 = 4000;
pub const FREQ_INITIAL: u32 = 800;

pub const VOLUME_MIN: u32 = 0;
pub const VOLUME_MAX: u32 = 100;
pub const VOLUME_INITIAL: u32 = 70;

pub const GAP_MIN: u32 = 0;
pub const GAP_MAX: u32 = 60;
pub const GAP_INITIAL: u32 = 0;

pub const WEIGHTING_MIN: u32 = 20;
pub const WEIGHTING_MAX: u32 = 80;
pub const WEIGHTING_INITIAL: u32 = 50;

pub const TOLERANCE_MIN: u32 = 0;
pub const TOLERANCE_MAX: u32 = 90;
pub const TOLERANCE_INITIAL: u32 = 50;

/// Default slope (envelope ramp) duration, microseconds.
pub const SLOPE_DURATION_INITIAL_US: u32 = 5_000;

pub const QUEUE_CAPACITY_MAX: usize = 3000;

/// Maximum number of dots/dashes buffered by a receiver before a
/// `NoMemory` overflow.
pub const REC_REPRESENTATION_CAPACITY: usize = 64;

/// Default noise-spike threshold: marks shorter than this are ignored.
pub const REC_NOISE_SPIKE_THRESHOLD_INITIAL_US: i64 = 10_000;

/// Preferred sample rates, highest quality first; a sink negotiates down
/// this list until the backend accepts one.
pub const PREFERRED_SAMPLE_RATES: [u32; 7] = [44100, 48000, 32000, 22050, 16000, 11025, 8000];
