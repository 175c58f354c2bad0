//! Sink interface (spec §4.8, a collaborator boundary): the generator
//! drives exactly one of these per backend. A sink is "blocking write": the
//! call is expected to consume wall-clock time equal to the audio it is
//! asked to produce, since that pacing is how tone durations become real
//! time.
//!
//! Per spec §1, concrete per-backend device I/O is an external concern;
//! `Null` and `Console` are self-contained here because they need no
//! platform audio stack, while OSS/ALSA/PulseAudio/Soundcard route through
//! the same `rodio`-backed implementation (see `RodioSink`) rather than
//! binding to each platform API directly.

use std::time::Duration;

use crate::config::Backend;
use crate::consts::PREFERRED_SAMPLE_RATES;
use crate::error::{CwError, CwResult};

pub const DEFAULT_DEVICE_NULL: &str = "null";
pub const DEFAULT_DEVICE_CONSOLE: &str = "console";
pub const DEFAULT_DEVICE_OSS: &str = "/dev/dsp";
pub const DEFAULT_DEVICE_ALSA: &str = "default";

/// What a sink just agreed to after `open()`: the generator must build its
/// sample buffer and derive timings against these, not whatever was asked
/// for.
#[derive(Debug, Clone, Copy)]
pub struct SinkNegotiated {
    pub sample_rate: u32,
    pub buffer_n_samples: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// The generator hands over raw PCM samples (`write_buffer`).
    Samples,
    /// The generator hands over an on/off state and a duration
    /// (`write_tone`) — used by backends with no real sample pipeline.
    ToneState,
}

/// Resolves the device name the generator should actually open, given a
/// user-requested name and backend. An empty or default-matching name
/// yields the backend's library default; `Soundcard` is an umbrella tag
/// that must not be opened directly.
pub fn resolve_device_name(backend: Backend, requested: &str) -> CwResult<String> {
    match backend {
        Backend::Soundcard => Err(CwError::invalid_argument(
            "'Soundcard' is an umbrella backend; select a concrete backend (Null/Console/OSS/ALSA/PulseAudio) instead",
        )),
        Backend::None => Ok(String::new()),
        Backend::Null => Ok(default_or(requested, DEFAULT_DEVICE_NULL)),
        Backend::Console => Ok(default_or(requested, DEFAULT_DEVICE_CONSOLE)),
        Backend::Oss => Ok(default_or(requested, DEFAULT_DEVICE_OSS)),
        Backend::Alsa => Ok(default_or(requested, DEFAULT_DEVICE_ALSA)),
        Backend::PulseAudio => Ok(if requested.is_empty() {
            String::new()
        } else {
            requested.to_string()
        }),
    }
}

fn default_or(requested: &str, default_name: &'static str) -> String {
    if requested.is_empty() || requested == default_name {
        default_name.to_string()
    } else {
        requested.to_string()
    }
}

/// Narrow device open/close/write contract every backend implements.
pub trait Sink: Send {
    fn write_mode(&self) -> WriteMode;

    fn open(&mut self, device_name: &str) -> CwResult<SinkNegotiated>;

    fn close(&mut self) -> CwResult<()>;

    fn write_buffer(&mut self, _samples: &[i16]) -> CwResult<()> {
        Err(CwError::Fatal("this sink does not accept sample buffers".into()))
    }

    fn write_tone(&mut self, _on: bool, _duration_us: i64) -> CwResult<()> {
        Err(CwError::Fatal("this sink does not accept tone-state writes".into()))
    }
}

/// Discards everything instantly. No wall-clock pacing: this is the
/// backend test code reaches for when it wants enqueue/dequeue semantics
/// without waiting out real Morse timing.
pub struct NullSink;

impl Sink for NullSink {
    fn write_mode(&self) -> WriteMode {
        WriteMode::ToneState
    }

    fn open(&mut self, _device_name: &str) -> CwResult<SinkNegotiated> {
        Ok(SinkNegotiated {
            sample_rate: PREFERRED_SAMPLE_RATES[0],
            buffer_n_samples: 1024,
        })
    }

    fn close(&mut self) -> CwResult<()> {
        Ok(())
    }

    fn write_tone(&mut self, _on: bool, _duration_us: i64) -> CwResult<()> {
        Ok(())
    }
}

/// Prints `.`/`_` for on/off transitions and actually sleeps the requested
/// duration, so it paces real time the way a buzzer would.
pub struct ConsoleSink {
    opened: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        ConsoleSink { opened: false }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn write_mode(&self) -> WriteMode {
        WriteMode::ToneState
    }

    fn open(&mut self, _device_name: &str) -> CwResult<SinkNegotiated> {
        self.opened = true;
        Ok(SinkNegotiated {
            sample_rate: PREFERRED_SAMPLE_RATES[0],
            buffer_n_samples: 1024,
        })
    }

    fn close(&mut self) -> CwResult<()> {
        self.opened = false;
        Ok(())
    }

    fn write_tone(&mut self, on: bool, duration_us: i64) -> CwResult<()> {
        if !self.opened {
            return Err(CwError::Fatal("console sink written to before open".into()));
        }
        print!("{}", if on { '.' } else { '_' });
        if duration_us > 0 {
            std::thread::sleep(Duration::from_micros(duration_us.max(0) as u64));
        }
        Ok(())
    }
}

/// Real audio output, backing every "actual sound card" backend tag
/// (OSS/ALSA/PulseAudio/the rodio-chosen default). `rodio` negotiates the
/// platform device; we just feed it i16 sample buffers and pace by
/// sleeping the buffer's nominal duration, which is what makes the
/// blocking-write contract hold even though rodio itself doesn't block.
pub struct RodioSink {
    sample_rate: u32,
    _stream: Option<rodio::OutputStream>,
    sink: Option<rodio::Sink>,
}

impl RodioSink {
    pub fn new() -> Self {
        RodioSink {
            sample_rate: PREFERRED_SAMPLE_RATES[0],
            _stream: None,
            sink: None,
        }
    }
}

impl Default for RodioSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for RodioSink {
    fn write_mode(&self) -> WriteMode {
        WriteMode::Samples
    }

    fn open(&mut self, _device_name: &str) -> CwResult<SinkNegotiated> {
        let (stream, handle) = rodio::OutputStream::try_default()
            .map_err(|e| CwError::SoundSystemUnavailable(e.to_string()))?;
        let sink = rodio::Sink::try_new(&handle)
            .map_err(|e| CwError::SoundSystemUnavailable(e.to_string()))?;
        self.sample_rate = PREFERRED_SAMPLE_RATES[0];
        self._stream = Some(stream);
        self.sink = Some(sink);
        Ok(SinkNegotiated {
            sample_rate: self.sample_rate,
            buffer_n_samples: 4096,
        })
    }

    fn close(&mut self) -> CwResult<()> {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self._stream = None;
        Ok(())
    }

    fn write_buffer(&mut self, samples: &[i16]) -> CwResult<()> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| CwError::Fatal("rodio sink written to before open".into()))?;
        let duration = Duration::from_secs_f64(samples.len() as f64 / self.sample_rate as f64);
        let source = rodio::buffer::SamplesBuffer::new(1, self.sample_rate, samples.to_vec());
        sink.append(source);
        std::thread::sleep(duration);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_name_defaults_are_filled_in() {
        assert_eq!(resolve_device_name(Backend::Null, "").unwrap(), DEFAULT_DEVICE_NULL);
        assert_eq!(
            resolve_device_name(Backend::Alsa, "").unwrap(),
            DEFAULT_DEVICE_ALSA
        );
        assert_eq!(resolve_device_name(Backend::PulseAudio, "").unwrap(), "");
    }

    #[test]
    fn umbrella_backend_is_rejected() {
        assert!(resolve_device_name(Backend::Soundcard, "").is_err());
    }

    #[test]
    fn custom_device_name_is_kept() {
        assert_eq!(
            resolve_device_name(Backend::Oss, "/dev/dsp1").unwrap(),
            "/dev/dsp1"
        );
    }

    #[test]
    fn null_sink_never_blocks() {
        let mut sink = NullSink;
        sink.open("").unwrap();
        let start = std::time::Instant::now();
        sink.write_tone(true, 50_000).unwrap();
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
