//! Generator (spec §4.6): owns a tone queue and a sink, runs one worker
//! thread that dequeues tones, synthesises them (or for state-based
//! backends, translates them into on/off + duration), and blocks on the
//! sink's write call for real-time pacing.
//!
//! Per the design note in spec §9, the queue owns its own lock; the
//! worker thread owns the mutable synthesis state (slope table, phase,
//! sample buffer). Clients touch only the queue handle (via the enqueue
//! layer) and the parameter setters/getters here, all of which go through
//! `parking_lot::Mutex`es shared with the worker.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{Backend, GeneratorConfig};
use crate::consts::*;
use crate::error::{CwError, CwResult};
use crate::queue::{DequeueResult, ToneQueue};
use crate::sink::{self, RodioSink, Sink, WriteMode};
use crate::slope::{SlopeShape, SlopeTable};
use crate::synth::{PlayingTone, Synthesiser};
use crate::timing::{compute_send_timing, SendTiming};
use crate::tone::{SlopeMode, Tone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValue {
    /// Silent / mark absent.
    Open,
    /// Sounding / mark present.
    Closed,
}

pub type KeyValueCallback = Arc<dyn Fn(KeyValue) + Send + Sync>;
pub type EmptyQueueHook = Arc<dyn Fn() + Send + Sync>;
pub type KeyerNotify = Arc<dyn Fn(bool, i64) + Send + Sync>;

struct Params {
    send_speed: u32,
    frequency: u32,
    volume_percent: u32,
    gap_units: u32,
    weighting_percent: u32,
    params_in_sync: bool,
    timing: SendTiming,
}

impl Params {
    fn new(cfg: &GeneratorConfig) -> Self {
        let timing = compute_send_timing(cfg.send_speed_wpm, cfg.weighting_percent, cfg.gap_units);
        Params {
            send_speed: cfg.send_speed_wpm,
            frequency: cfg.frequency_hz,
            volume_percent: cfg.volume_percent,
            gap_units: cfg.gap_units,
            weighting_percent: cfg.weighting_percent,
            params_in_sync: true,
            timing,
        }
    }

    fn resync(&mut self) {
        if !self.params_in_sync {
            self.timing = compute_send_timing(self.send_speed, self.weighting_percent, self.gap_units);
            self.params_in_sync = true;
        }
    }
}

pub(crate) struct Shared {
    pub queue: Arc<ToneQueue>,
    params: Mutex<Params>,
    slope: Mutex<SlopeTable>,
    sink: Mutex<Box<dyn Sink>>,
    label: Mutex<String>,
    backend: Backend,
    device_name: Mutex<String>,
    sample_rate: AtomicU32,
    buffer_n_samples: AtomicU32,

    running: AtomicBool,
    do_work: AtomicBool,
    silencing: AtomicBool,

    key_value: Mutex<KeyValue>,
    key_value_cb: Mutex<Option<KeyValueCallback>>,
    empty_queue_hook: Mutex<Option<EmptyQueueHook>>,
    keyer_notify: Mutex<Option<KeyerNotify>>,

    /// Touched only by the enqueue layer, as spec §9's open question
    /// insists: never read or written by the worker. Values are always
    /// one of 0, 1, 3, 7.
    pub(crate) space_units_count: AtomicU8,
}

pub struct Generator {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    pub(crate) fn slope_duration_us(&self) -> i64 {
        self.slope.lock().duration_us as i64
    }
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> CwResult<Self> {
        config.validate()?;

        let device_name = sink::resolve_device_name(config.backend, &config.device_name)?;
        let sink_impl: Box<dyn Sink> = match config.backend {
            Backend::Null => Box::new(crate::sink::NullSink),
            Backend::Console => Box::new(crate::sink::ConsoleSink::new()),
            Backend::Oss | Backend::Alsa | Backend::PulseAudio => Box::new(RodioSink::new()),
            Backend::None => Box::new(crate::sink::NullSink),
            Backend::Soundcard => unreachable!("validated above"),
        };

        let slope_table = SlopeTable::new(
            config.slope_shape,
            config.slope_duration_us,
            config.volume_percent,
            PREFERRED_SAMPLE_RATES[0],
        );

        let shared = Arc::new(Shared {
            queue: Arc::new(ToneQueue::new()),
            params: Mutex::new(Params::new(&config)),
            slope: Mutex::new(slope_table),
            sink: Mutex::new(sink_impl),
            label: Mutex::new(String::new()),
            backend: config.backend,
            device_name: Mutex::new(device_name),
            sample_rate: AtomicU32::new(PREFERRED_SAMPLE_RATES[0]),
            buffer_n_samples: AtomicU32::new(1024),
            running: AtomicBool::new(false),
            do_work: AtomicBool::new(false),
            silencing: AtomicBool::new(false),
            key_value: Mutex::new(KeyValue::Open),
            key_value_cb: Mutex::new(None),
            empty_queue_hook: Mutex::new(None),
            keyer_notify: Mutex::new(None),
            space_units_count: AtomicU8::new(0),
        });

        Ok(Generator {
            shared,
            worker: Mutex::new(None),
        })
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub fn get_sound_device(&self) -> String {
        self.shared.device_name.lock().clone()
    }

    pub fn get_sound_system(&self) -> Backend {
        self.shared.backend
    }

    pub fn set_label(&self, label: impl Into<String>) {
        *self.shared.label.lock() = label.into();
    }

    pub fn get_label(&self) -> String {
        self.shared.label.lock().clone()
    }

    // -------------------------------------------------------------- start/stop

    pub fn start(&self) -> CwResult<()> {
        if self.shared.running.load(Ordering::Acquire) {
            return Ok(());
        }
        {
            let mut sink = self.shared.sink.lock();
            let device_name = self.shared.device_name.lock().clone();
            let negotiated = sink.open(&device_name)?;
            self.shared.sample_rate.store(negotiated.sample_rate, Ordering::Release);
            self.shared
                .buffer_n_samples
                .store(negotiated.buffer_n_samples as u32, Ordering::Release);
            self.shared.slope.lock().set_sample_rate(negotiated.sample_rate);
        }

        self.shared.do_work.store(true, Ordering::Release);
        self.shared.running.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("cw-generator-worker".into())
            .spawn(move || worker_loop(shared))
            .map_err(|e| CwError::Fatal(format!("failed to start worker thread: {e}")))?;

        // Brief settling wait, mirroring the C original's post-spawn pause
        // before callers start enqueuing.
        std::thread::sleep(Duration::from_millis(1));

        *self.worker.lock() = Some(handle);
        log::debug!("generator worker started");
        Ok(())
    }

    pub fn stop(&self) -> CwResult<()> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Ok(());
        }
        // Order matters: mark the in-flight/next tone for graceful
        // silencing, and only then tell the worker to wind down, so it
        // still has a live tone to convert into a falling-slope one
        // (spec §4.6 step 3) instead of finding the queue already
        // emptied out from under it.
        self.shared.silencing.store(true, Ordering::Release);
        self.shared.do_work.store(false, Ordering::Release);
        self.shared.queue.wake_waiters(); // unparks a worker in wait_for_nonempty

        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        self.shared.running.store(false, Ordering::Release);
        self.shared.queue.flush();

        let mut sink = self.shared.sink.lock();
        let _ = sink.close();
        log::debug!("generator worker stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    // -------------------------------------------------------------- parameters

    pub fn set_send_speed(&self, wpm: u32) -> CwResult<()> {
        check_range("send_speed", wpm, SPEED_MIN, SPEED_MAX)?;
        let mut p = self.shared.params.lock();
        p.send_speed = wpm;
        p.params_in_sync = false;
        Ok(())
    }

    pub fn get_send_speed(&self) -> u32 {
        self.shared.params.lock().send_speed
    }

    pub fn get_send_speed_limits() -> (u32, u32) {
        (SPEED_MIN, SPEED_MAX)
    }

    pub fn set_frequency(&self, hz: u32) -> CwResult<()> {
        check_range("frequency", hz, FREQ_MIN, FREQ_MAX)?;
        self.shared.params.lock().frequency = hz;
        Ok(())
    }

    pub fn get_frequency(&self) -> u32 {
        self.shared.params.lock().frequency
    }

    pub fn get_frequency_limits() -> (u32, u32) {
        (FREQ_MIN, FREQ_MAX)
    }

    pub fn set_volume(&self, percent: u32) -> CwResult<()> {
        check_range("volume", percent, VOLUME_MIN, VOLUME_MAX)?;
        self.shared.params.lock().volume_percent = percent;
        self.shared.slope.lock().set_volume_percent(percent);
        Ok(())
    }

    pub fn get_volume(&self) -> u32 {
        self.shared.params.lock().volume_percent
    }

    pub fn get_volume_limits() -> (u32, u32) {
        (VOLUME_MIN, VOLUME_MAX)
    }

    pub fn set_gap(&self, units: u32) -> CwResult<()> {
        check_range("gap", units, GAP_MIN, GAP_MAX)?;
        let mut p = self.shared.params.lock();
        p.gap_units = units;
        p.params_in_sync = false;
        Ok(())
    }

    pub fn get_gap(&self) -> u32 {
        self.shared.params.lock().gap_units
    }

    pub fn get_gap_limits() -> (u32, u32) {
        (GAP_MIN, GAP_MAX)
    }

    pub fn set_weighting(&self, percent: u32) -> CwResult<()> {
        check_range("weighting", percent, WEIGHTING_MIN, WEIGHTING_MAX)?;
        let mut p = self.shared.params.lock();
        p.weighting_percent = percent;
        p.params_in_sync = false;
        Ok(())
    }

    pub fn get_weighting(&self) -> u32 {
        self.shared.params.lock().weighting_percent
    }

    pub fn get_weighting_limits() -> (u32, u32) {
        (WEIGHTING_MIN, WEIGHTING_MAX)
    }

    pub fn set_tone_slope(&self, shape: Option<SlopeShape>, duration_us: Option<u32>) -> CwResult<()> {
        self.shared.slope.lock().set_tone_slope(shape, duration_us)
    }

    /// Current timing parameters, resynchronising them first if any of
    /// speed/gap/weighting changed since the last resync.
    pub(crate) fn current_timing(&self) -> SendTiming {
        let mut p = self.shared.params.lock();
        p.resync();
        p.timing
    }

    // -------------------------------------------------------------- queue passthrough

    pub fn get_queue_length(&self) -> usize {
        self.shared.queue.length()
    }

    pub fn is_queue_full(&self) -> bool {
        self.shared.queue.is_full()
    }

    pub fn flush_queue(&self) {
        self.shared.queue.flush();
        self.shared.space_units_count.store(0, Ordering::Relaxed);
    }

    pub fn remove_last_character(&self) {
        self.shared.queue.remove_last_character();
    }

    pub fn set_high_water_mark(&self, level: usize) {
        self.shared.queue.set_high_water_mark(level);
    }

    pub fn get_high_water_mark(&self) -> usize {
        self.shared.queue.high_water_mark()
    }

    pub fn wait_for_queue_level(&self, level: usize) {
        self.shared.queue.wait_for_level(level);
    }

    pub fn wait_for_end_of_current_tone(&self) {
        self.shared.queue.wait_for_end_of_current_tone();
    }

    pub fn register_low_water_callback(&self, cb: Option<crate::queue::LowWaterCallback>, level: usize) {
        self.shared.queue.register_low_water_callback(cb, level);
    }

    pub fn register_value_tracking_callback(&self, cb: Option<KeyValueCallback>) {
        *self.shared.key_value_cb.lock() = cb;
    }

    pub fn register_empty_queue_hook(&self, hook: Option<EmptyQueueHook>) {
        *self.shared.empty_queue_hook.lock() = hook;
    }

    pub fn register_keyer_notify(&self, notify: Option<KeyerNotify>) {
        *self.shared.keyer_notify.lock() = notify;
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        let _ = self.stop();
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

// -------------------------------------------------------------- worker

fn report_key_value(shared: &Shared, new_value: KeyValue) {
    let mut current = shared.key_value.lock();
    if *current == new_value {
        return;
    }
    *current = new_value;
    drop(current);
    if let Some(cb) = shared.key_value_cb.lock().clone() {
        cb(new_value);
    }
}

fn silencing_tone(shared: &Shared, previous: &Tone) -> Tone {
    let slope_duration = shared.slope.lock().duration_us;
    let buffer_duration_us = {
        let sr = shared.sample_rate.load(Ordering::Acquire).max(1) as i64;
        let n = shared.buffer_n_samples.load(Ordering::Acquire) as i64;
        (n * 1_000_000) / sr
    };
    let duration = (slope_duration as i64).max(buffer_duration_us).max(1);
    Tone::new(previous.frequency, duration, SlopeMode::FallingOnly)
        .unwrap_or_else(|_| Tone::new(0, duration, SlopeMode::FallingOnly).unwrap())
}

fn worker_loop(shared: Arc<Shared>) {
    match shared.sink.lock().write_mode() {
        WriteMode::ToneState => worker_loop_tone_state(shared),
        WriteMode::Samples => worker_loop_samples(shared),
    }
}

fn worker_loop_tone_state(shared: Arc<Shared>) {
    let mut previous_tone: Option<Tone> = None;

    // Keep looping past `do_work` going false as long as a silencing tone
    // is still owed: that's what lets a stop() that lands while this
    // worker is mid-loop still get one graceful falling-slope tone out
    // instead of being cut off immediately.
    while shared.do_work.load(Ordering::Acquire) || shared.silencing.load(Ordering::Acquire) {
        let stopping = !shared.do_work.load(Ordering::Acquire);
        let result = shared.queue.dequeue();
        let was_silencing = shared.silencing.load(Ordering::Acquire);

        let tone = match result {
            DequeueResult::Empty => {
                if let Some(hook) = shared.empty_queue_hook.lock().clone() {
                    hook();
                }
                if was_silencing {
                    match previous_tone.filter(|t| !t.is_silent()) {
                        Some(prev) => silencing_tone(&shared, &prev),
                        None => {
                            shared.silencing.store(false, Ordering::Release);
                            report_key_value(&shared, KeyValue::Open);
                            break;
                        }
                    }
                } else if stopping {
                    report_key_value(&shared, KeyValue::Open);
                    break;
                } else {
                    report_key_value(&shared, KeyValue::Open);
                    shared.queue.wait_for_nonempty(&shared.do_work);
                    continue;
                }
            }
            DequeueResult::Nonempty(t) | DequeueResult::JustEmptied(t) => {
                if was_silencing {
                    silencing_tone(&shared, &previous_tone.unwrap_or(t))
                } else {
                    t
                }
            }
        };

        report_key_value(
            &shared,
            if tone.is_silent() { KeyValue::Open } else { KeyValue::Closed },
        );

        let on = !tone.is_silent();
        if let Err(e) = shared.sink.lock().write_tone(on, tone.duration_us) {
            log::warn!("sink write_tone failed, retrying once: {e}");
            if let Err(e2) = shared.sink.lock().write_tone(on, tone.duration_us) {
                log::error!("sink write_tone failed after retry: {e2}");
            }
        }

        if let Some(notify) = shared.keyer_notify.lock().clone() {
            notify(on, tone.duration_us);
        }

        previous_tone = Some(tone);

        if was_silencing {
            shared.queue.flush();
            shared.silencing.store(false, Ordering::Release);
            previous_tone = None;
            break;
        }
    }
}

fn worker_loop_samples(shared: Arc<Shared>) {
    let sample_rate = shared.sample_rate.load(Ordering::Acquire);
    let buffer_len = shared.buffer_n_samples.load(Ordering::Acquire) as usize;
    let mut synth = Synthesiser::new(sample_rate);
    let mut buffer = vec![0i16; buffer_len.max(1)];
    let mut cursor = 0usize;
    let mut playing: Option<PlayingTone> = None;
    let mut previous_tone: Option<Tone> = None;
    let mut done = false;

    // See worker_loop_tone_state: stay alive past `do_work` going false
    // while a silencing tone is still owed, so stop() can still hear one
    // graceful falling-slope tone instead of an abrupt cut.
    while !done && (shared.do_work.load(Ordering::Acquire) || shared.silencing.load(Ordering::Acquire)) {
        if playing.as_ref().map(|p| p.is_done()).unwrap_or(true) {
            if let Some(finished) = playing.take() {
                if let Some(notify) = shared.keyer_notify.lock().clone() {
                    notify(!finished.tone.is_silent(), finished.tone.duration_us);
                }
                previous_tone = Some(finished.tone);
            }

            let stopping = !shared.do_work.load(Ordering::Acquire);
            let result = shared.queue.dequeue();
            let was_silencing = shared.silencing.load(Ordering::Acquire);

            let tone = match result {
                DequeueResult::Empty => {
                    if let Some(hook) = shared.empty_queue_hook.lock().clone() {
                        hook();
                    }
                    if was_silencing {
                        match previous_tone.filter(|t| !t.is_silent()) {
                            Some(prev) => silencing_tone(&shared, &prev),
                            None => {
                                shared.silencing.store(false, Ordering::Release);
                                report_key_value(&shared, KeyValue::Open);
                                break;
                            }
                        }
                    } else if stopping {
                        report_key_value(&shared, KeyValue::Open);
                        break;
                    } else {
                        report_key_value(&shared, KeyValue::Open);
                        let remaining = buffer_len - cursor;
                        if remaining == 0 {
                            shared.queue.wait_for_nonempty(&shared.do_work);
                            continue;
                        }
                        let pad_duration_us =
                            (remaining as i64 * 1_000_000) / sample_rate.max(1) as i64;
                        Tone::new(0, pad_duration_us.max(1), SlopeMode::NoSlopes).unwrap()
                    }
                }
                DequeueResult::Nonempty(t) | DequeueResult::JustEmptied(t) => {
                    if was_silencing {
                        silencing_tone(&shared, &previous_tone.unwrap_or(t))
                    } else {
                        t
                    }
                }
            };

            report_key_value(
                &shared,
                if tone.is_silent() { KeyValue::Open } else { KeyValue::Closed },
            );

            let slope_table = shared.slope.lock().clone();
            playing = Some(PlayingTone::new(tone, sample_rate, &slope_table));

            if was_silencing {
                shared.queue.flush();
                shared.silencing.store(false, Ordering::Release);
                previous_tone = None;
                done = true;
            }
        }

        if let Some(p) = playing.as_mut() {
            let slope_table = shared.slope.lock().clone();
            let stop = buffer_len - 1;
            let written = synth.synthesize_range(p, &slope_table, &mut buffer, cursor, stop);
            cursor += written;
            if cursor >= buffer_len {
                if let Err(e) = shared.sink.lock().write_buffer(&buffer) {
                    log::warn!("sink write_buffer failed, retrying once: {e}");
                    if let Err(e2) = shared.sink.lock().write_buffer(&buffer) {
                        log::error!("sink write_buffer failed after retry: {e2}");
                    }
                }
                cursor = 0;
            }
        }
    }

    // Flush whatever landed in the buffer but hadn't reached a full
    // fragment yet, so a silencing tone synthesized on the final pass
    // above (too short to fill `buffer` on its own) still reaches the
    // sink instead of being discarded with the rest of the loop state.
    if cursor > 0 {
        if let Err(e) = shared.sink.lock().write_buffer(&buffer[..cursor]) {
            log::warn!("sink write_buffer (final partial) failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn null_config() -> GeneratorConfig {
        GeneratorConfig {
            backend: Backend::Null,
            ..Default::default()
        }
    }

    #[test]
    fn new_generator_queue_is_empty() {
        let g = Generator::new(null_config()).unwrap();
        assert_eq!(g.get_queue_length(), 0);
        assert!(!g.is_queue_full());
    }

    #[test]
    fn start_stop_is_idempotent_and_clean() {
        let g = Generator::new(null_config()).unwrap();
        g.start().unwrap();
        assert!(g.is_running());
        g.start().unwrap();
        g.stop().unwrap();
        assert!(!g.is_running());
        g.stop().unwrap();
    }

    #[test]
    fn setters_reject_out_of_range_values() {
        let g = Generator::new(null_config()).unwrap();
        assert!(g.set_send_speed(SPEED_MAX + 1).is_err());
        assert!(g.set_frequency(FREQ_MAX + 1).is_err());
        assert!(g.set_volume(VOLUME_MAX + 1).is_err());
        assert!(g.set_gap(GAP_MAX + 1).is_err());
        assert!(g.set_weighting(WEIGHTING_MAX + 1).is_err());
    }

    #[test]
    fn changing_speed_reflects_in_timing() {
        let g = Generator::new(null_config()).unwrap();
        g.set_send_speed(4).unwrap();
        let t = g.current_timing();
        assert_eq!(t.dash_us, 900_000);
    }

    #[test]
    fn key_value_callback_fires_on_transitions_only() {
        let g = Generator::new(null_config()).unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events2 = events.clone();
        g.register_value_tracking_callback(Some(Arc::new(move |v| events2.lock().push(v))));
        g.start().unwrap();

        g.shared()
            .queue
            .enqueue(Tone::forever(600, SlopeMode::RisingOnly).unwrap())
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        g.shared().queue.enqueue(Tone::new(0, 1000, SlopeMode::FallingOnly).unwrap()).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        g.stop().unwrap();

        let log = events.lock();
        assert!(log.contains(&KeyValue::Closed));
    }
}
