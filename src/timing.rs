//! Timing calculator (spec §4.2): derives integer-microsecond element
//! durations from (speed, weighting, gap) on the send side, and
//! classification ranges from (speed, tolerance, gap, adaptive) on the
//! receive side.

use crate::consts::CAL;

/// Durations an enqueue layer needs to build mark/space tones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendTiming {
    pub dot_us: i64,
    pub dash_us: i64,
    pub ims_us: i64,
    pub ics_us: i64,
    pub iws_us: i64,
    pub additional_space_us: i64,
    pub adjustment_space_us: i64,
}

/// `unit = CAL / speed`, then the formulas from spec §4.2.
pub fn compute_send_timing(speed_wpm: u32, weighting_pct: u32, gap_units: u32) -> SendTiming {
    let unit = CAL / speed_wpm as i64;
    let weight_adj = (2 * (weighting_pct as i64 - 50) * unit) / 100;
    let dot = unit + weight_adj;
    let dash = 3 * dot;
    let w = (28 * weight_adj) / 22;
    let ims = unit - w;
    let ics = 3 * unit + w;
    let iws = 7 * unit - w;
    let additional_space = gap_units as i64 * unit;
    let adjustment_space = (7 * additional_space) / 3;

    SendTiming {
        dot_us: dot,
        dash_us: dash,
        ims_us: ims,
        ics_us: ics,
        iws_us: iws,
        additional_space_us: additional_space,
        adjustment_space_us: adjustment_space,
    }
}

/// An inclusive `[min, max]` classification window. `max == i64::MAX` marks
/// an open-ended upper bound (used for the adaptive dash range).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkRange {
    pub min: i64,
    pub max: i64,
}

impl MarkRange {
    pub fn contains(&self, len_us: i64) -> bool {
        len_us >= self.min && len_us <= self.max
    }
}

/// Classification ranges plus ideal durations used by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveLimits {
    pub dot: MarkRange,
    pub dash: MarkRange,
    pub ims: MarkRange,
    pub ics: MarkRange,
    pub dot_ideal: i64,
    pub dash_ideal: i64,
    pub ims_ideal: i64,
    pub ics_ideal: i64,
    pub additional_delay_us: i64,
    pub adjustment_delay_us: i64,
}

pub fn compute_receive_limits(
    speed_wpm: u32,
    tolerance_pct: u32,
    gap_units: u32,
    adaptive: bool,
) -> ReceiveLimits {
    let unit = CAL / speed_wpm as i64;
    let dot_ideal = unit;
    let dash_ideal = 3 * unit;
    let ims_ideal = unit;
    let ics_ideal = 3 * unit;

    let additional_delay_us = gap_units as i64 * unit;
    let adjustment_delay_us = (7 * additional_delay_us) / 3;

    if adaptive {
        let dot = MarkRange {
            min: 0,
            max: 2 * dot_ideal,
        };
        let dash = MarkRange {
            min: dot.max,
            max: i64::MAX,
        };
        let ims = dot;
        let ics = MarkRange {
            min: dot.max + 1,
            max: 5 * dot_ideal,
        };
        ReceiveLimits {
            dot,
            dash,
            ims,
            ics,
            dot_ideal,
            dash_ideal,
            ims_ideal,
            ics_ideal,
            additional_delay_us,
            adjustment_delay_us,
        }
    } else {
        let tol = (tolerance_pct as i64 * dot_ideal) / 100;
        let dot = MarkRange {
            min: dot_ideal - tol,
            max: dot_ideal + tol,
        };
        let dash = MarkRange {
            min: dash_ideal - tol,
            max: dash_ideal + tol,
        };
        let ims = MarkRange {
            min: ims_ideal - tol,
            max: ims_ideal + tol,
        };
        let ics = MarkRange {
            min: ics_ideal - tol,
            max: ics_ideal + tol + additional_delay_us + adjustment_delay_us,
        };
        ReceiveLimits {
            dot,
            dash,
            ims,
            ics,
            dot_ideal,
            dash_ideal,
            ims_ideal,
            ics_ideal,
            additional_delay_us,
            adjustment_delay_us,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_relations_at_default_weighting_and_gap() {
        for speed in [4u32, 12, 20, 40, 60] {
            let t = compute_send_timing(speed, 50, 0);
            assert_eq!(t.dash_us, 3 * t.dot_us);
            assert_eq!(t.ics_us, 3 * t.dot_us);
            assert_eq!(t.ims_us, t.dot_us);
            assert_eq!(t.iws_us, 7 * t.dot_us);
        }
    }

    #[test]
    fn four_wpm_absolute_values() {
        let t = compute_send_timing(4, 50, 0);
        assert_eq!(t.dash_us, 900_000);
        assert_eq!(t.iws_us, 2_100_000);
    }

    #[test]
    fn fixed_mode_ranges_well_ordered() {
        for tolerance in [0u32, 20, 50, 90] {
            let l = compute_receive_limits(20, tolerance, 0, false);
            assert!(l.dot.min <= l.dot_ideal && l.dot_ideal <= l.dot.max);
            assert!(l.dot.max < l.dash.min);
            assert!(l.dash.min <= l.dash_ideal && l.dash_ideal <= l.dash.max);
            assert!(l.ims.max < l.ics.min);
        }
    }

    #[test]
    fn zero_tolerance_collapses_to_ideal() {
        let l = compute_receive_limits(20, 0, 0, false);
        assert_eq!(l.dot.min, l.dot_ideal);
        assert_eq!(l.dot.max, l.dot_ideal);
        assert_eq!(l.dash.min, l.dash_ideal);
        assert_eq!(l.dash.max, l.dash_ideal);
    }

    #[test]
    fn adaptive_mode_ranges() {
        let l = compute_receive_limits(20, 50, 0, true);
        assert_eq!(l.dot.min, 0);
        assert_eq!(l.dot.max, 2 * l.dot_ideal);
        assert_eq!(l.dash.min, l.dot.max);
        assert_eq!(l.dash.max, i64::MAX);
        assert!(l.ims.max < l.ics.min);
    }
}
