//! A Morse code signal engine: timed tone generation with envelope
//! synthesis on the send side, and an adaptive mark/space classifier on
//! the receive side.
//!
//! The crate is organised the way the timing math actually flows: data
//! tables and constants first, then the timing calculator both sides
//! share, then the send path (tone -> queue -> generator -> enqueue) and
//! finally the receive path (timing classification -> receiver ->
//! statistics).

mod config;
mod consts;
mod enqueue;
mod error;
mod generator;
mod queue;
mod receiver;
mod sink;
mod slope;
mod stats;
mod synth;
mod tables;
mod timing;
mod tone;

pub use config::{Backend, GeneratorConfig};
pub use error::{CwError, CwResult};
pub use generator::{EmptyQueueHook, Generator, KeyValue, KeyValueCallback, KeyerNotify};
pub use queue::{DequeueResult, LowWaterCallback};
pub use receiver::{PollResult, Receiver, ReceiverState};
pub use sink::{Sink, SinkNegotiated, WriteMode};
pub use slope::SlopeShape;
pub use stats::{StatKind, Statistics};
pub use tables::{
    character_of_representation, is_valid_character, is_valid_representation, list_all_characters,
    representation_of_character,
};
pub use timing::{compute_receive_limits, compute_send_timing, MarkRange, ReceiveLimits, SendTiming};
pub use tone::{SlopeMode, Tone};
