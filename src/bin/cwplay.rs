use std::io::Read;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use cw_engine::{Backend, GeneratorConfig, Generator, SlopeShape};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Speed in WPM (PARIS standard)
    #[arg(short, long, default_value_t = 20)]
    wpm: u32,

    /// Tone frequency in Hz
    #[arg(short, long, default_value_t = 700)]
    frequency: u32,

    /// Volume percent
    #[arg(long, default_value_t = 70)]
    volume: u32,

    /// Extra gap between characters, in dot units
    #[arg(short, long, default_value_t = 0)]
    gap: u32,

    /// Envelope shape for tone rise/fall
    #[arg(long, value_enum, default_value_t = Shape::RaisedCosine)]
    slope_shape: Shape,

    /// Output backend
    #[arg(long, value_enum, default_value_t = Sound::PulseAudio)]
    sound: Sound,

    /// Read text from file instead of stdin
    #[arg(long)]
    file: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Shape {
    Linear,
    Sine,
    RaisedCosine,
    Rectangular,
}

impl From<Shape> for SlopeShape {
    fn from(s: Shape) -> Self {
        match s {
            Shape::Linear => SlopeShape::Linear,
            Shape::Sine => SlopeShape::Sine,
            Shape::RaisedCosine => SlopeShape::RaisedCosine,
            Shape::Rectangular => SlopeShape::Rectangular,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Sound {
    Null,
    Console,
    PulseAudio,
    Alsa,
    Oss,
}

impl From<Sound> for Backend {
    fn from(s: Sound) -> Self {
        match s {
            Sound::Null => Backend::Null,
            Sound::Console => Backend::Console,
            Sound::PulseAudio => Backend::PulseAudio,
            Sound::Alsa => Backend::Alsa,
            Sound::Oss => Backend::Oss,
        }
    }
}

fn read_input(args: &Args) -> Result<String> {
    if let Some(path) = &args.file {
        std::fs::read_to_string(path).with_context(|| format!("reading {path}"))
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        Ok(buf)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let text = read_input(&args)?;

    let config = GeneratorConfig {
        backend: args.sound.into(),
        send_speed_wpm: args.wpm,
        frequency_hz: args.frequency,
        volume_percent: args.volume,
        gap_units: args.gap,
        slope_shape: args.slope_shape.into(),
        ..Default::default()
    };

    let generator = Generator::new(config).context("building generator")?;
    generator.start().context("starting generator")?;

    for line in text.lines() {
        generator
            .enqueue_string(&line.to_uppercase())
            .with_context(|| format!("enqueuing line {line:?}"))?;
        generator.enqueue_character(' ').ok();
    }

    generator.wait_for_queue_level(0);
    generator.stop().context("stopping generator")?;
    Ok(())
}
