use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cpal::{
    FromSample, Sample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};

use crate::channel::{ControlChannel, mailbox};
use crate::engine::LoopEngine;
use crate::{AudioProcessor, EngineConfig};

/// Audio-clock time as seen by the output stream.
#[derive(Debug, Clone)]
pub struct EngineClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl EngineClock {
    fn new(sample_rate: u32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Seconds of audio rendered so far. This is the clock transport
    /// snapshots' `current_bar_started` should be expressed in.
    pub fn now(&self) -> f64 {
        self.frames_rendered() as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

pub struct AudioEngineHandle {
    pub control: ControlChannel,
    pub streams: EngineStreams,
}

impl AudioEngineHandle {
    pub fn into_parts(self) -> (ControlChannel, EngineStreams) {
        (self.control, self.streams)
    }
}

/// Running device streams. Audio stops when this is dropped.
pub struct EngineStreams {
    pub sample_rate: u32,
    pub channels: usize,
    pub clock: EngineClock,
    _output: cpal::Stream,
    input: Option<cpal::Stream>,
}

impl EngineStreams {
    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }
}

/// Open the default output (and, if available, input) device and run a
/// [`LoopEngine`] in the output callback.
///
/// The device's sample rate and channel count override the ones in `config`.
pub fn start(config: EngineConfig) -> anyhow::Result<AudioEngineHandle> {
    anyhow::ensure!(config.max_block_frames > 0, "max_block_frames must be non-zero");
    anyhow::ensure!(
        config.command_capacity > 0 && config.status_capacity > 0,
        "ring capacities must be non-zero"
    );
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.into();
    let config = EngineConfig {
        sample_rate: stream_config.sample_rate.0,
        channels: stream_config.channels as usize,
        ..config
    };
    anyhow::ensure!(config.channels > 0, "output device reports no channels");
    log::info!(
        "audio output: {} Hz, {} channels, {:?}",
        config.sample_rate,
        config.channels,
        sample_format
    );

    let (input, input_rx) = match start_input(&host, &config) {
        Ok((stream, rx)) => (Some(stream), Some(rx)),
        Err(err) => {
            log::warn!("running without audio input: {err}");
            (None, None)
        }
    };

    let (control, mailbox) = mailbox(&config);
    let engine = LoopEngine::new(config, mailbox);
    let clock = EngineClock::new(config.sample_rate);

    let output = match sample_format {
        cpal::SampleFormat::F32 => {
            build_output::<f32>(&device, &stream_config, engine, input_rx, clock.clone())?
        }
        cpal::SampleFormat::I16 => {
            build_output::<i16>(&device, &stream_config, engine, input_rx, clock.clone())?
        }
        sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
    };

    output.play()?;

    Ok(AudioEngineHandle {
        control,
        streams: EngineStreams {
            sample_rate: config.sample_rate,
            channels: config.channels,
            clock,
            _output: output,
            input,
        },
    })
}

fn start_input(
    host: &cpal::Host,
    config: &EngineConfig,
) -> anyhow::Result<(cpal::Stream, rtrb::Consumer<f32>)> {
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow::anyhow!("no input device found"))?;
    let supported = device.default_input_config()?;
    let sample_format = supported.sample_format();
    let stream_config = cpal::StreamConfig {
        channels: supported.channels(),
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    // A few blocks of slack between the two device callbacks.
    let capacity = config.max_block_frames * config.channels * 16;
    let (tx, rx) = rtrb::RingBuffer::<f32>::new(capacity);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_input::<f32>(&device, &stream_config, config.channels, tx)?,
        cpal::SampleFormat::I16 => build_input::<i16>(&device, &stream_config, config.channels, tx)?,
        sample_format => anyhow::bail!("unsupported input sample format '{sample_format}'"),
    };
    stream.play()?;
    log::info!("audio input: {} channels", stream_config.channels);

    Ok((stream, rx))
}

/// Push interleaved input frames remapped to `channels` output channels.
fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut tx: rtrb::Producer<f32>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let input_channels = config.channels as usize;

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(input_channels) {
                // Whole frames only, so channels never drift.
                if tx.slots() < channels {
                    return;
                }
                for ch in 0..channels {
                    let _ = tx.push(frame[ch % frame.len()].to_sample::<f32>());
                }
            }
        },
        |err| log::error!("audio input error: {err}"),
        None,
    )?;
    Ok(stream)
}

/// Fill `scratch` with `frames` planar frames from the interleaved input ring.
///
/// A frame is taken only when all of its channels are there; otherwise the
/// frame is silence and the partial one stays queued.
fn pull_input(rx: &mut rtrb::Consumer<f32>, scratch: &mut [Vec<f32>], frames: usize) {
    for buf in scratch.iter_mut() {
        buf.clear();
    }
    for _ in 0..frames {
        let whole = rx.slots() >= scratch.len();
        for buf in scratch.iter_mut() {
            let sample = if whole { rx.pop().unwrap_or(0.0) } else { 0.0 };
            buf.push(sample);
        }
    }
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: LoopEngine,
    mut input_rx: Option<rtrb::Consumer<f32>>,
    clock: EngineClock,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0 as f64;
    let max_frames = engine.config().max_block_frames;

    let scratch = || -> Vec<Vec<f32>> {
        (0..channels)
            .map(|_| Vec::with_capacity(max_frames))
            .collect()
    };
    let mut input_scratch = scratch();
    let mut output_scratch = scratch();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for chunk in data.chunks_mut(max_frames * channels) {
                let frames = chunk.len() / channels;

                for buf in output_scratch.iter_mut() {
                    buf.clear();
                    buf.resize(frames, 0.0);
                }
                if let Some(rx) = input_rx.as_mut() {
                    pull_input(rx, &mut input_scratch, frames);
                }
                let input: &[Vec<f32>] = if input_rx.is_some() {
                    &input_scratch
                } else {
                    &[]
                };

                let now = clock.frames_rendered() as f64 / sample_rate;
                let rendered = engine.process_block(now, input, &mut output_scratch);

                for (i, frame) in chunk.chunks_mut(channels).enumerate() {
                    for (ch, sample) in frame.iter_mut().enumerate() {
                        let value = match rendered {
                            Ok(()) => output_scratch[ch][i],
                            Err(_) => 0.0,
                        };
                        *sample = T::from_sample(value);
                    }
                }
                clock.frames.fetch_add(frames as u64, Ordering::Relaxed);
            }
        },
        |err| log::error!("audio output error: {err}"),
        None,
    )?;

    Ok(stream)
}
