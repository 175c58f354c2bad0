//! Enqueue layer (spec §4.7): translates characters, representations,
//! strings and raw key events into correctly timed mark/space tones on a
//! `Generator`'s queue, tracking the trailing inter-element gap so spaces
//! compose correctly (mark -> ims -> ... -> ics, ics -> iws, etc).

use std::sync::atomic::Ordering;

use crate::error::{CwError, CwResult};
use crate::generator::Generator;
use crate::tables;
use crate::tone::{SlopeMode, Tone};

impl Generator {
    fn reset_space_units(&self) {
        self.shared().space_units_count.store(0, Ordering::Relaxed);
    }

    fn check_high_water(&self) -> CwResult<()> {
        if self.shared().queue.is_at_or_above_high_water() {
            return Err(CwError::Again("tone queue at or above high-water mark".into()));
        }
        Ok(())
    }

    fn enqueue_mark(&self, is_dash: bool, is_first_of_character: bool) -> CwResult<()> {
        let timing = self.current_timing();
        let frequency = self.get_frequency();
        let duration = if is_dash { timing.dash_us } else { timing.dot_us };
        let mut tone = Tone::new(frequency, duration.max(0), SlopeMode::Standard)?;
        if is_first_of_character {
            tone = tone.first_of_character();
        }
        self.shared().queue.enqueue(tone)?;
        self.reset_space_units();
        Ok(())
    }

    fn enqueue_ims_tone(&self) -> CwResult<()> {
        let timing = self.current_timing();
        let tone = Tone::new(0, timing.ims_us.max(0), SlopeMode::NoSlopes)?;
        self.shared().queue.enqueue(tone)?;
        self.shared().space_units_count.store(1, Ordering::Relaxed);
        Ok(())
    }

    /// Enqueues a space whose duration is `ics - already_enqueued + additional_space`,
    /// where `already_enqueued` is derived from whatever space the antecedent
    /// mark/space already queued (spec §4.7).
    pub fn enqueue_inter_character_space(&self) -> CwResult<()> {
        let timing = self.current_timing();
        let prior = self.shared().space_units_count.load(Ordering::Relaxed);
        let already_us = match prior {
            0 => 0,
            1 | 3 | 7 => prior as i64 * timing.dot_us,
            other => {
                log::warn!("invalid antecedent space-unit count {other} before inter-character-space, using full duration");
                0
            }
        };
        let remaining = (timing.ics_us - already_us).max(0) + timing.additional_space_us;
        let tone = Tone::new(0, remaining.max(0), SlopeMode::NoSlopes)?;
        self.shared().queue.enqueue(tone)?;
        self.shared().space_units_count.store(3, Ordering::Relaxed);
        Ok(())
    }

    /// Enqueues an inter-word-space, split into at least two sub-tones so
    /// that a low-water-mark == 1 listener reliably observes the 2 -> 1
    /// transition (spec §4.7, §9 open question: N == 1 is an intentional
    /// regression-test misconfiguration, never used here).
    pub fn enqueue_inter_word_space(&self) -> CwResult<()> {
        self.enqueue_inter_word_space_split(2)
    }

    /// Internal hook so a regression test can reproduce the `N == 1` bug
    /// deliberately; not part of the public surface.
    pub(crate) fn enqueue_inter_word_space_split(&self, n: usize) -> CwResult<()> {
        let n = n.max(1);
        let timing = self.current_timing();
        let prior = self.shared().space_units_count.load(Ordering::Relaxed);
        let already_us = match prior {
            0 => 0,
            1 | 3 | 7 => prior as i64 * timing.dot_us,
            other => {
                log::warn!("invalid antecedent space-unit count {other} before inter-word-space, using full duration");
                0
            }
        };
        let remaining = (timing.iws_us - already_us).max(0);
        let per_tone = remaining / n as i64;
        let remainder = remaining - per_tone * n as i64;

        for i in 0..n {
            let extra = if i == n - 1 { remainder } else { 0 };
            let tone = Tone::new(0, (per_tone + extra).max(0), SlopeMode::NoSlopes)?;
            self.shared().queue.enqueue(tone)?;
        }

        if timing.adjustment_space_us != 0 {
            let tone = Tone::new(0, timing.adjustment_space_us.max(0), SlopeMode::NoSlopes)?;
            self.shared().queue.enqueue(tone)?;
        }

        self.shared().space_units_count.store(7, Ordering::Relaxed);
        Ok(())
    }

    fn enqueue_representation_impl(&self, rep: &str, with_ics: bool) -> CwResult<()> {
        if !tables::is_valid_representation(rep) {
            return Err(CwError::invalid_argument(format!(
                "'{rep}' is not a valid representation"
            )));
        }
        self.check_high_water()?;

        let result = (|| -> CwResult<()> {
            for (i, sym) in rep.chars().enumerate() {
                let is_dash = sym == '-';
                self.enqueue_mark(is_dash, i == 0)?;
                self.enqueue_ims_tone()?;
            }
            if with_ics {
                self.enqueue_inter_character_space()?;
            }
            Ok(())
        })();

        if result.is_err() {
            self.reset_space_units();
        }
        result
    }

    pub fn enqueue_representation(&self, rep: &str) -> CwResult<()> {
        self.enqueue_representation_impl(rep, true)
    }

    pub fn enqueue_representation_no_ics(&self, rep: &str) -> CwResult<()> {
        self.enqueue_representation_impl(rep, false)
    }

    fn enqueue_character_impl(&self, c: char, with_ics: bool) -> CwResult<()> {
        if c == ' ' {
            return self.enqueue_inter_word_space();
        }
        let rep = tables::representation_of_character(c)?;
        self.enqueue_representation_impl(rep, with_ics)
    }

    pub fn enqueue_character(&self, c: char) -> CwResult<()> {
        self.enqueue_character_impl(c, true)
    }

    pub fn enqueue_character_no_ics(&self, c: char) -> CwResult<()> {
        self.enqueue_character_impl(c, false)
    }

    pub fn enqueue_string(&self, s: &str) -> CwResult<()> {
        for c in s.chars() {
            if c != ' ' && tables::representation_of_character(c).is_err() {
                return Err(CwError::NotFound(format!("no Morse representation for character '{c}'")));
            }
        }
        for c in s.chars() {
            self.enqueue_character(c)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------- key events

    /// Straight-key down: a rising-slope tone held forever until
    /// `begin_space` is called.
    pub fn begin_mark(&self) -> CwResult<()> {
        let frequency = self.get_frequency();
        let tone = Tone::forever(frequency, SlopeMode::RisingOnly)?;
        self.shared().queue.enqueue(tone)?;
        self.reset_space_units();
        Ok(())
    }

    /// Straight-key up: ramp the current tone down, optionally followed by
    /// a silent forever tone so the sink stays "open" (useful for backends
    /// where closing and reopening the device between key events is
    /// audible or slow).
    pub fn begin_space(&self, keep_sink_alive: bool) -> CwResult<()> {
        let frequency = self.get_frequency();
        let slope_duration_us = self.shared().slope_duration_us();
        let falling = Tone::new(frequency, slope_duration_us.max(1), SlopeMode::FallingOnly)?;
        self.shared().queue.enqueue(falling)?;
        if keep_sink_alive {
            let silent = Tone::forever(0, SlopeMode::NoSlopes)?;
            self.shared().queue.enqueue(silent)?;
        }
        self.reset_space_units();
        Ok(())
    }

    /// Iambic/ultimatic keyer symbol: a standalone dot or dash with
    /// standard (rising + falling) slopes.
    pub fn enqueue_keyer_dot(&self) -> CwResult<()> {
        self.enqueue_mark(false, true)
    }

    pub fn enqueue_keyer_dash(&self) -> CwResult<()> {
        self.enqueue_mark(true, true)
    }

    /// Inter-mark-space between two keyer symbols: no slopes, full ims
    /// duration.
    pub fn enqueue_keyer_inter_mark_space(&self) -> CwResult<()> {
        self.enqueue_ims_tone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Backend, GeneratorConfig};

    fn test_generator() -> Generator {
        Generator::new(GeneratorConfig {
            backend: Backend::Null,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn enqueue_representation_produces_mark_ims_pairs_plus_ics() {
        let g = test_generator();
        g.enqueue_representation("-.-").unwrap(); // K
        // 3 marks, 3 ims, 1 ics = 7 tones
        assert_eq!(g.get_queue_length(), 7);
    }

    #[test]
    fn no_ics_variant_omits_final_space() {
        let g = test_generator();
        g.enqueue_representation_no_ics("-.-").unwrap();
        assert_eq!(g.get_queue_length(), 6);
    }

    #[test]
    fn enqueue_character_space_is_inter_word_space() {
        let g = test_generator();
        g.enqueue_character(' ').unwrap();
        // split into >= 2 sub-tones
        assert!(g.get_queue_length() >= 2);
    }

    #[test]
    fn enqueue_string_validates_before_enqueuing_anything() {
        let g = test_generator();
        let err = g.enqueue_string("AB\u{1}C").unwrap_err();
        assert!(matches!(err, CwError::NotFound(_)));
        assert_eq!(g.get_queue_length(), 0);
    }

    #[test]
    fn invalid_representation_is_rejected() {
        let g = test_generator();
        assert!(g.enqueue_representation("").is_err());
        assert!(g.enqueue_representation("-x-").is_err());
    }

    #[test]
    fn high_water_mark_blocks_further_enqueues_with_again() {
        let g = test_generator();
        g.register_low_water_callback(None, 0);
        g.shared().queue.set_high_water_mark(5);
        for _ in 0..10 {
            let _ = g.enqueue_character('E'); // single dot, cheap
        }
        let err = g.enqueue_character('E');
        assert!(matches!(err, Err(CwError::Again(_))));
    }

    #[test]
    fn sk_procedural_signal_concatenates_without_ics() {
        let g = test_generator();
        g.enqueue_character_no_ics('S').unwrap();
        g.enqueue_character('K').unwrap();
        // S(...) + K(-.-) with ics only after K
        let rep_s = tables::representation_of_character('S').unwrap();
        let rep_k = tables::representation_of_character('K').unwrap();
        let expected = rep_s.len() + rep_k.len(); // marks
        let expected_tones = expected * 2 /* mark+ims each */ + 1 /* final ics */;
        assert_eq!(g.get_queue_length(), expected_tones);
    }
}
