use std::path::Path;

use looper_engine::AudioProcessor;
use looper_transport::ChannelBuffers;

/// Interleaved render result.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl RenderedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Copy one channel out of the interleaved samples.
    pub fn channel(&self, channel: usize) -> Vec<f32> {
        self.samples
            .iter()
            .skip(channel)
            .step_by(self.channels.max(1) as usize)
            .copied()
            .collect()
    }
}

/// Drive `processor` block by block, the way an audio host would, without a
/// device.
///
/// `input` is read from frame 0 and padded with silence once it runs out.
/// `now` for each block is the number of frames rendered so far divided by
/// `sample_rate`.
pub fn render_offline<P: AudioProcessor>(
    processor: &mut P,
    input: Option<&ChannelBuffers>,
    channels: u16,
    total_frames: usize,
    block_frames: usize,
    sample_rate: u32,
) -> anyhow::Result<RenderedAudio> {
    anyhow::ensure!(block_frames > 0, "block size must be non-zero");
    anyhow::ensure!(sample_rate > 0, "sample rate must be non-zero");
    let output_channels = channels as usize;
    if let Some(input) = input {
        anyhow::ensure!(
            input.channel_count() == output_channels,
            "input has {} channels, render has {}",
            input.channel_count(),
            output_channels
        );
    }

    let mut input_block: Vec<Vec<f32>> = vec![Vec::new(); output_channels];
    let mut output_block: Vec<Vec<f32>> = vec![Vec::new(); output_channels];
    let mut samples = Vec::with_capacity(total_frames * output_channels);

    let mut rendered = 0;
    while rendered < total_frames {
        let frames = block_frames.min(total_frames - rendered);

        for buf in output_block.iter_mut() {
            buf.clear();
            buf.resize(frames, 0.0);
        }
        if let Some(input) = input {
            for (dst, src) in input_block.iter_mut().zip(input.channels()) {
                dst.clear();
                let start = rendered.min(src.len());
                let end = (rendered + frames).min(src.len());
                dst.extend_from_slice(&src[start..end]);
                dst.resize(frames, 0.0);
            }
        }
        let block_input: &[Vec<f32>] = if input.is_some() { &input_block } else { &[] };

        let now = rendered as f64 / sample_rate as f64;
        processor.process_block(now, block_input, &mut output_block)?;

        for frame in 0..frames {
            for channel in &output_block {
                samples.push(channel[frame]);
            }
        }
        rendered += frames;
    }

    Ok(RenderedAudio {
        samples,
        sample_rate,
        channels,
    })
}

pub fn write_wav(buffer: &RenderedAudio, path: &Path) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;

    for &sample in &buffer.samples {
        writer.write_sample(sample)?;
    }

    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use looper_engine::{ControlChannel, EngineConfig, LoopEngine, mailbox};
    use looper_transport::{ControlMessage, TransportSnapshot};
    use tempfile::tempdir;

    fn engine() -> (LoopEngine, ControlChannel) {
        let config = EngineConfig {
            sample_rate: 8000,
            channels: 2,
            max_block_frames: 64,
            ..EngineConfig::default()
        };
        let (control, mailbox) = mailbox(&config);
        (LoopEngine::new(config, mailbox), control)
    }

    fn start(control: &mut ControlChannel) {
        control
            .update_transport(TransportSnapshot::playing_at(120.0, 4, 0.0, 0.0))
            .unwrap();
    }

    #[test]
    fn test_render_loops_take() {
        let (mut engine, mut control) = engine();
        control
            .send(ControlMessage::Load {
                clip_id: "A".to_string(),
                token: "t1".to_string(),
                buffer: vec![vec![1.0, 2.0, 3.0]],
            })
            .unwrap();
        control
            .send(ControlMessage::Play {
                clip_id: "A".to_string(),
            })
            .unwrap();
        start(&mut control);

        let audio = render_offline(&mut engine, None, 2, 7, 4, 8000).unwrap();
        assert_eq!(audio.frames(), 7);
        assert_eq!(audio.channel(0), vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0]);
        assert_eq!(audio.channel(1), audio.channel(0));
    }

    #[test]
    fn test_render_passes_input_through() {
        let (mut engine, mut control) = engine();
        start(&mut control);

        let input = ChannelBuffers::new(vec![vec![0.25; 5], vec![-0.5; 5]]).unwrap();
        let audio = render_offline(&mut engine, Some(&input), 2, 8, 3, 8000).unwrap();

        assert_eq!(
            audio.channel(0),
            vec![0.25, 0.25, 0.25, 0.25, 0.25, 0.0, 0.0, 0.0]
        );
        assert_eq!(
            audio.channel(1),
            vec![-0.5, -0.5, -0.5, -0.5, -0.5, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_stopped_engine_renders_silence() {
        let (mut engine, _control) = engine();
        let audio = render_offline(&mut engine, None, 2, 16, 8, 8000).unwrap();
        assert_eq!(audio.samples, vec![0.0; 32]);
    }

    #[test]
    fn test_render_rejects_mismatched_input() {
        let (mut engine, _control) = engine();
        let input = ChannelBuffers::silent(1, 4);
        assert!(render_offline(&mut engine, Some(&input), 2, 4, 4, 8000).is_err());
    }

    #[test]
    fn test_render_reports_block_errors() {
        let (mut engine, _control) = engine();
        // Engine accepts at most 64 frames per block.
        assert!(render_offline(&mut engine, None, 2, 128, 128, 8000).is_err());
        // And exactly the configured channel count.
        assert!(render_offline(&mut engine, None, 1, 4, 4, 8000).is_err());
    }

    #[test]
    fn test_write_wav() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("out.wav");
        let audio = RenderedAudio {
            samples: vec![0.0, 0.5, -0.5, 1.0],
            sample_rate: 8000,
            channels: 2,
        };

        write_wav(&audio, &path).expect("write");

        let mut reader = hound::WavReader::open(&path).expect("open");
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 8000);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, audio.samples);
    }
}
