//! Receiver (spec §4.9): a state machine that classifies mark durations
//! into dots/dashes, tracks spaces, supports fixed and adaptive speeds,
//! and produces characters and representations.
//!
//! Spec §9 asks for "classify a mark" to be kept separate from "update
//! receiver state" rather than the C original's switch-on-everything
//! layout; `classify_mark_length` below does only the former, and
//! `mark_end` is the only place state actually transitions.

use crate::consts::*;
use crate::error::{CwError, CwResult};
use crate::stats::{StatKind, Statistics};
use crate::tables;
use crate::timing::{compute_receive_limits, MarkRange, ReceiveLimits};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    InTone,
    AfterTone,
    EndChar,
    EndWord,
    ErrChar,
    ErrWord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkClass {
    Dot,
    Dash,
    Neither,
}

fn classify_mark_length(len_us: i64, dot: MarkRange, dash: MarkRange) -> MarkClass {
    if dot.contains(len_us) {
        MarkClass::Dot
    } else if dash.contains(len_us) {
        MarkClass::Dash
    } else {
        MarkClass::Neither
    }
}

const AVERAGING_LENGTH: usize = 4;

#[derive(Debug, Clone, Copy)]
struct MovingAverage {
    buf: [i64; AVERAGING_LENGTH],
    filled: usize,
    idx: usize,
    sum: i64,
}

impl Default for MovingAverage {
    fn default() -> Self {
        MovingAverage {
            buf: [0; AVERAGING_LENGTH],
            filled: 0,
            idx: 0,
            sum: 0,
        }
    }
}

impl MovingAverage {
    fn push(&mut self, value: i64) {
        if self.filled < AVERAGING_LENGTH {
            self.buf[self.idx] = value;
            self.sum += value;
            self.filled += 1;
        } else {
            self.sum -= self.buf[self.idx];
            self.sum += value;
            self.buf[self.idx] = value;
        }
        self.idx = (self.idx + 1) % AVERAGING_LENGTH;
    }

    fn average(&self) -> i64 {
        if self.filled == 0 {
            0
        } else {
            self.sum / self.filled as i64
        }
    }

    /// Pre-fills every slot with `value`, so the average matches a target
    /// duration immediately instead of needing `AVERAGING_LENGTH` real
    /// samples to warm up.
    fn reset_to(&mut self, value: i64) {
        self.buf = [value; AVERAGING_LENGTH];
        self.filled = AVERAGING_LENGTH;
        self.idx = 0;
        self.sum = value * AVERAGING_LENGTH as i64;
    }
}

#[derive(Debug, Clone)]
pub struct PollResult {
    pub representation: String,
    pub is_end_of_word: bool,
    pub is_error: bool,
}

pub struct Receiver {
    speed: u32,
    tolerance: u32,
    gap_units: u32,
    adaptive: bool,
    noise_spike_threshold_us: i64,
    adaptive_speed_threshold_us: i64,

    state: ReceiverState,
    tone_start_us: Option<i64>,
    tone_end_us: Option<i64>,
    representation: String,

    avg_dot: MovingAverage,
    avg_dash: MovingAverage,
    statistics: Statistics,

    limits: ReceiveLimits,
    limits_in_sync: bool,
}

impl Receiver {
    pub fn new() -> Self {
        let speed = SPEED_INITIAL;
        let limits = compute_receive_limits(speed, TOLERANCE_INITIAL, GAP_INITIAL, false);
        Receiver {
            speed,
            tolerance: TOLERANCE_INITIAL,
            gap_units: GAP_INITIAL,
            adaptive: false,
            noise_spike_threshold_us: REC_NOISE_SPIKE_THRESHOLD_INITIAL_US,
            adaptive_speed_threshold_us: 2 * limits.dot_ideal,
            state: ReceiverState::Idle,
            tone_start_us: None,
            tone_end_us: None,
            representation: String::new(),
            avg_dot: MovingAverage::default(),
            avg_dash: MovingAverage::default(),
            statistics: Statistics::new(),
            limits,
            limits_in_sync: true,
        }
    }

    fn mark_limits_dirty(&mut self) {
        self.limits_in_sync = false;
    }

    fn current_limits(&mut self) -> ReceiveLimits {
        if !self.limits_in_sync {
            self.limits = compute_receive_limits(self.speed, self.tolerance, self.gap_units, self.adaptive);
            self.limits_in_sync = true;
        }
        self.limits
    }

    // -------------------------------------------------------------- parameters

    pub fn set_speed(&mut self, wpm: u32) -> CwResult<()> {
        if self.adaptive {
            return Err(CwError::Permission("cannot set a fixed speed while adaptive mode is enabled".into()));
        }
        if wpm < SPEED_MIN || wpm > SPEED_MAX {
            return Err(CwError::invalid_argument(format!(
                "speed {wpm} out of range [{SPEED_MIN}, {SPEED_MAX}]"
            )));
        }
        self.speed = wpm;
        self.mark_limits_dirty();
        Ok(())
    }

    pub fn get_speed(&self) -> u32 {
        self.speed
    }

    pub fn set_tolerance(&mut self, percent: u32) -> CwResult<()> {
        if self.adaptive {
            return Err(CwError::Permission("tolerance has no effect in adaptive mode".into()));
        }
        if percent > TOLERANCE_MAX {
            return Err(CwError::invalid_argument(format!(
                "tolerance {percent} out of range [{TOLERANCE_MIN}, {TOLERANCE_MAX}]"
            )));
        }
        self.tolerance = percent;
        self.mark_limits_dirty();
        Ok(())
    }

    pub fn get_tolerance(&self) -> u32 {
        self.tolerance
    }

    pub fn set_gap(&mut self, units: u32) -> CwResult<()> {
        if units > GAP_MAX {
            return Err(CwError::invalid_argument(format!(
                "gap {units} out of range [{GAP_MIN}, {GAP_MAX}]"
            )));
        }
        self.gap_units = units;
        self.mark_limits_dirty();
        Ok(())
    }

    pub fn set_noise_spike_threshold(&mut self, threshold_us: i64) -> CwResult<()> {
        if threshold_us < 0 {
            return Err(CwError::invalid_argument("noise-spike threshold must be >= 0"));
        }
        self.noise_spike_threshold_us = threshold_us;
        Ok(())
    }

    pub fn get_noise_spike_threshold(&self) -> i64 {
        self.noise_spike_threshold_us
    }

    /// Mirrors `cw_receiver_set_adaptive_internal`: switching into adaptive
    /// mode re-seeds the dot/dash moving averages with the ideal durations
    /// at the current speed, so early marks are classified sensibly before
    /// enough real samples have arrived to outweigh the seed.
    pub fn enable_adaptive_mode(&mut self) {
        if self.adaptive {
            return;
        }
        self.adaptive = true;
        self.mark_limits_dirty();
        let limits = self.current_limits();
        self.avg_dot.reset_to(limits.dot_ideal);
        self.avg_dash.reset_to(limits.dash_ideal);
        self.adaptive_speed_threshold_us = 2 * limits.dot_ideal;
    }

    pub fn disable_adaptive_mode(&mut self, fixed_speed_wpm: u32) -> CwResult<()> {
        if fixed_speed_wpm < SPEED_MIN || fixed_speed_wpm > SPEED_MAX {
            return Err(CwError::invalid_argument(format!(
                "speed {fixed_speed_wpm} out of range [{SPEED_MIN}, {SPEED_MAX}]"
            )));
        }
        self.adaptive = false;
        self.speed = fixed_speed_wpm;
        self.mark_limits_dirty();
        Ok(())
    }

    pub fn get_adaptive_state(&self) -> bool {
        self.adaptive
    }

    pub fn get_statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn get_receive_buffer_length(&self) -> usize {
        self.representation.len()
    }

    pub fn get_receive_buffer_capacity(&self) -> usize {
        REC_REPRESENTATION_CAPACITY
    }

    pub fn clear_buffer(&mut self) {
        self.representation.clear();
        self.state = ReceiverState::Idle;
    }

    pub fn reset(&mut self) {
        self.clear_buffer();
        self.statistics.reset();
        self.avg_dot = MovingAverage::default();
        self.avg_dash = MovingAverage::default();
        self.tone_start_us = None;
        self.tone_end_us = None;
    }

    // -------------------------------------------------------------- state machine

    pub fn mark_begin(&mut self, ts_us: i64) -> CwResult<()> {
        match self.state {
            ReceiverState::Idle => {
                self.tone_start_us = Some(ts_us);
                self.state = ReceiverState::InTone;
                Ok(())
            }
            ReceiverState::AfterTone => {
                if let Some(tone_end) = self.tone_end_us {
                    let ims_ideal = self.current_limits().ims_ideal;
                    self.statistics.record(StatKind::ImsSpace, ts_us - tone_end, ims_ideal);
                }
                self.tone_start_us = Some(ts_us);
                self.state = ReceiverState::InTone;
                Ok(())
            }
            _ => Err(CwError::OutOfRange(
                "mark_begin is only legal from Idle or AfterTone".into(),
            )),
        }
    }

    pub fn mark_end(&mut self, ts_us: i64) -> CwResult<()> {
        if self.state != ReceiverState::InTone {
            return Err(CwError::OutOfRange("mark_end is only legal from InTone".into()));
        }
        let tone_start = self
            .tone_start_us
            .expect("InTone state implies tone_start_us is set");
        let len = ts_us - tone_start;

        if len <= self.noise_spike_threshold_us {
            self.state = if self.representation.is_empty() {
                ReceiverState::Idle
            } else {
                ReceiverState::AfterTone
            };
            return Err(CwError::Again("mark shorter than the noise-spike threshold".into()));
        }

        let limits = self.current_limits();
        match classify_mark_length(len, limits.dot, limits.dash) {
            MarkClass::Dot => self.push_symbol('.', len, limits.dot_ideal)?,
            MarkClass::Dash => self.push_symbol('-', len, limits.dash_ideal)?,
            MarkClass::Neither => {
                self.state = if len > limits.ics.max {
                    ReceiverState::ErrWord
                } else {
                    ReceiverState::ErrChar
                };
                return Err(CwError::NotFound(
                    "mark length matches neither the dot nor the dash range".into(),
                ));
            }
        }

        self.tone_end_us = Some(ts_us);
        self.state = ReceiverState::AfterTone;
        Ok(())
    }

    fn push_symbol(&mut self, symbol: char, len_us: i64, ideal_us: i64) -> CwResult<()> {
        if self.representation.len() >= REC_REPRESENTATION_CAPACITY {
            self.state = ReceiverState::ErrChar;
            return Err(CwError::NoMemory("representation buffer is full".into()));
        }
        self.representation.push(symbol);

        let kind = if symbol == '.' { StatKind::Dot } else { StatKind::Dash };
        self.statistics.record(kind, len_us, ideal_us);

        if self.adaptive {
            match symbol {
                '.' => self.avg_dot.push(len_us),
                '-' => self.avg_dash.push(len_us),
                _ => {}
            }
            let avg_dot = self.avg_dot.average();
            let avg_dash = self.avg_dash.average();
            self.adaptive_speed_threshold_us = avg_dot + (avg_dash - avg_dot) / 2;
            let unit = (self.adaptive_speed_threshold_us / 2).max(1);
            let new_speed = (CAL / unit).clamp(SPEED_MIN as i64, SPEED_MAX as i64) as u32;
            self.speed = new_speed;
            self.mark_limits_dirty();
        }
        Ok(())
    }

    /// Shorthand used by testers/keyers that already know the symbol and
    /// skip timing classification entirely.
    pub fn add_dot(&mut self, ts_us: i64) -> CwResult<()> {
        self.add_symbol('.', ts_us)
    }

    pub fn add_dash(&mut self, ts_us: i64) -> CwResult<()> {
        self.add_symbol('-', ts_us)
    }

    fn add_symbol(&mut self, symbol: char, ts_us: i64) -> CwResult<()> {
        if !matches!(self.state, ReceiverState::Idle | ReceiverState::AfterTone) {
            return Err(CwError::OutOfRange(
                "add_dot/add_dash are only legal from Idle or AfterTone".into(),
            ));
        }
        if self.representation.len() >= REC_REPRESENTATION_CAPACITY {
            self.state = ReceiverState::ErrChar;
            return Err(CwError::NoMemory("representation buffer is full".into()));
        }
        self.representation.push(symbol);
        self.tone_end_us = Some(ts_us);
        self.state = ReceiverState::AfterTone;
        Ok(())
    }

    pub fn poll_representation(&mut self, ts_us: i64) -> CwResult<PollResult> {
        match self.state {
            ReceiverState::EndWord | ReceiverState::ErrWord => Ok(PollResult {
                representation: self.representation.clone(),
                is_end_of_word: true,
                is_error: self.state == ReceiverState::ErrWord,
            }),
            ReceiverState::Idle | ReceiverState::InTone => {
                Err(CwError::Again("not ready: no completed mark yet".into()))
            }
            ReceiverState::AfterTone | ReceiverState::EndChar | ReceiverState::ErrChar => {
                let was_error = self.state == ReceiverState::ErrChar;
                let tone_end = self
                    .tone_end_us
                    .ok_or_else(|| CwError::OutOfRange("no completed tone yet".into()))?;
                let limits = self.current_limits();
                let gap = ts_us - tone_end;

                if limits.ics.contains(gap) {
                    self.statistics.record(StatKind::IcsSpace, gap, limits.ics_ideal);
                    self.state = ReceiverState::EndChar;
                    Ok(PollResult {
                        representation: self.representation.clone(),
                        is_end_of_word: false,
                        is_error: was_error,
                    })
                } else if gap > limits.ics.max {
                    self.state = if was_error {
                        ReceiverState::ErrWord
                    } else {
                        ReceiverState::EndWord
                    };
                    Ok(PollResult {
                        representation: self.representation.clone(),
                        is_end_of_word: true,
                        is_error: was_error,
                    })
                } else {
                    Err(CwError::Again("gap too short to classify yet".into()))
                }
            }
        }
    }

    pub fn poll_character(&mut self, ts_us: i64) -> CwResult<(char, bool, bool)> {
        let poll = self.poll_representation(ts_us)?;
        let c = tables::character_of_representation(&poll.representation)
            .map_err(|_| CwError::NotFound(format!("no character for representation '{}'", poll.representation)))?;
        Ok((c, poll.is_end_of_word, poll.is_error))
    }
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wpm_timing(wpm: u32) -> crate::timing::SendTiming {
        crate::timing::compute_send_timing(wpm, 50, 0)
    }

    #[test]
    fn new_receiver_is_idle_with_empty_buffer() {
        let r = Receiver::new();
        assert_eq!(r.get_receive_buffer_length(), 0);
        assert!(!r.get_adaptive_state());
    }

    #[test]
    fn decodes_a_dot_at_fixed_speed() {
        let mut r = Receiver::new();
        r.set_speed(20).unwrap();
        let t = wpm_timing(20);
        r.mark_begin(0).unwrap();
        r.mark_end(t.dot_us).unwrap();
        assert_eq!(r.get_receive_buffer_length(), 1);
    }

    #[test]
    fn noise_spike_is_rejected_and_state_reverts() {
        let mut r = Receiver::new();
        r.mark_begin(0).unwrap();
        let err = r.mark_end(1).unwrap_err(); // far shorter than any dot
        assert!(matches!(err, CwError::Again(_)));
    }

    #[test]
    fn full_paris_round_trip_at_12_wpm() {
        let mut r = Receiver::new();
        r.set_speed(12).unwrap();
        let t = wpm_timing(12);
        let mut ts = 0i64;

        for rep in [".--.", ".-", ".-.", "..", "..."] {
            for sym in rep.chars() {
                let dur = if sym == '.' { t.dot_us } else { t.dash_us };
                r.mark_begin(ts).unwrap();
                ts += dur;
                r.mark_end(ts).unwrap();
                ts += t.ims_us; // inter-mark-space before next element
            }
            ts += t.ics_us - t.ims_us; // top up to full inter-character-space
            let poll = r.poll_representation(ts).unwrap();
            assert!(!poll.is_error);
            let c = tables::character_of_representation(&poll.representation).unwrap();
            assert!("PARIS".contains(c));
            r.clear_buffer();
        }
    }

    #[test]
    fn adaptive_mode_tracks_speed_change() {
        let mut r = Receiver::new();
        let starting_speed = r.get_speed();
        r.enable_adaptive_mode();
        let fast = wpm_timing(30);
        let mut ts = 0i64;
        for i in 0..20 {
            let is_dash = i % 2 == 1;
            let dur = if is_dash { fast.dash_us } else { fast.dot_us };
            r.mark_begin(ts).unwrap();
            ts += dur;
            r.mark_end(ts).unwrap();
            ts += fast.ims_us;
            r.clear_buffer();
        }
        assert!(r.get_speed() > starting_speed); // tracking toward 30 wpm
    }
}
