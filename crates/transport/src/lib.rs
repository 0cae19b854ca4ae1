pub mod message;
pub mod timing;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

pub use message::{BufferChunk, ControlMessage, EngineEvent, MessageError};
pub use timing::{
    LoopBounds, LoopConfig, TransportClock, TransportSnapshot, beat_position, loop_bounds,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("channel {channel} has {len} frames, expected {expected}")]
    RaggedChannels {
        channel: usize,
        len: usize,
        expected: usize,
    },

    #[error("expected {expected} channels, got {found}")]
    ChannelCountMismatch { expected: usize, found: usize },
}

/// Planar (non-interleaved) audio: one buffer per channel, all the same length.
///
/// This is the shape a take is stored in and the shape the render block hands
/// to the engine, so reads are a plain index into a channel slice.
///
/// # Examples
///
/// ```
/// use looper_transport::ChannelBuffers;
///
/// let audio = ChannelBuffers::new(vec![vec![0.0, 0.5], vec![1.0, 1.5]]).unwrap();
/// assert_eq!(audio.channel_count(), 2);
/// assert_eq!(audio.frames(), 2);
/// assert_eq!(audio.channel(1), &[1.0, 1.5]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelBuffers {
    channels: Vec<Vec<f32>>,
}

impl ChannelBuffers {
    /// Wrap per-channel buffers, rejecting ragged input.
    ///
    /// Zero channels is allowed and describes a silent, empty take.
    pub fn new(channels: Vec<Vec<f32>>) -> Result<Self, AudioError> {
        if let Some(first) = channels.first() {
            let expected = first.len();
            for (channel, buffer) in channels.iter().enumerate() {
                if buffer.len() != expected {
                    return Err(AudioError::RaggedChannels {
                        channel,
                        len: buffer.len(),
                        expected,
                    });
                }
            }
        }
        Ok(Self { channels })
    }

    pub fn silent(channels: usize, frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channels],
        }
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// True when there is nothing to play: no channels or zero frames.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Samples of one channel.
    ///
    /// # Panics
    ///
    /// Panics if `channel` is >= `self.channel_count()`.
    #[inline]
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.channels[channel]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn into_inner(self) -> Vec<Vec<f32>> {
        self.channels
    }

    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.frames() as f64 / sample_rate as f64
    }

    /// Append one block of planar audio to the end of every channel.
    ///
    /// An empty buffer adopts the block's channel count; afterwards the count
    /// is fixed.
    pub fn extend_from_block<S: AsRef<[f32]>>(&mut self, block: &[S]) -> Result<(), AudioError> {
        if self.channels.is_empty() {
            self.channels = vec![Vec::new(); block.len()];
        } else if self.channels.len() != block.len() {
            return Err(AudioError::ChannelCountMismatch {
                expected: self.channels.len(),
                found: block.len(),
            });
        }

        let expected = block.first().map_or(0, |c| c.as_ref().len());
        for (channel, samples) in block.iter().enumerate() {
            let len = samples.as_ref().len();
            if len != expected {
                return Err(AudioError::RaggedChannels {
                    channel,
                    len,
                    expected,
                });
            }
        }

        for (dst, src) in self.channels.iter_mut().zip(block) {
            dst.extend_from_slice(src.as_ref());
        }
        Ok(())
    }

    /// Interleave into `[L, R, L, R, ...]` order.
    pub fn interleave(&self) -> Vec<f32> {
        let channels = self.channel_count();
        let mut samples = Vec::with_capacity(self.frames() * channels);
        for frame in 0..self.frames() {
            for channel in &self.channels {
                samples.push(channel[frame]);
            }
        }
        samples
    }

    /// Resample to a target sample rate.
    ///
    /// If the rates already match, returns a clone.
    pub fn resample(&self, from_rate: u32, to_rate: u32) -> anyhow::Result<Self> {
        resample_channels(self, from_rate, to_rate)
    }
}

impl TryFrom<Vec<Vec<f32>>> for ChannelBuffers {
    type Error = AudioError;

    fn try_from(channels: Vec<Vec<f32>>) -> Result<Self, Self::Error> {
        Self::new(channels)
    }
}

/// Resample planar audio using sinc interpolation.
///
/// Used when a take decoded at one rate is loaded into an engine running at
/// another.
///
/// # Examples
///
/// ```
/// use looper_transport::{ChannelBuffers, resample_channels};
///
/// let audio = ChannelBuffers::silent(1, 44100);
/// let resampled = resample_channels(&audio, 44100, 48000).unwrap();
/// assert_eq!(resampled.channel_count(), 1);
/// ```
pub fn resample_channels(
    audio: &ChannelBuffers,
    from_rate: u32,
    to_rate: u32,
) -> anyhow::Result<ChannelBuffers> {
    if from_rate == to_rate {
        return Ok(audio.clone());
    }
    anyhow::ensure!(from_rate > 0 && to_rate > 0, "sample rates must be non-zero");

    let channels = audio.channel_count();
    let input_frames = audio.frames();
    if channels == 0 || input_frames == 0 {
        return Ok(ChannelBuffers::silent(channels, 0));
    }

    let resample_ratio = to_rate as f64 / from_rate as f64;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler =
        SincFixedIn::<f32>::new(resample_ratio, 2.0, params, input_frames, channels)?;

    // Input is already planar, which is what rubato wants.
    let output = resampler.process(audio.channels(), None)?;

    Ok(ChannelBuffers::new(output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(frequency: f32, sample_rate: u32, duration_secs: f32, channels: usize) -> ChannelBuffers {
        let frames = (sample_rate as f32 * duration_secs) as usize;
        let channel: Vec<f32> = (0..frames)
            .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect();
        ChannelBuffers::new(vec![channel; channels]).unwrap()
    }

    #[test]
    fn test_new_rejects_ragged_channels() {
        let err = ChannelBuffers::new(vec![vec![0.0; 4], vec![0.0; 3]]).unwrap_err();
        assert_eq!(
            err,
            AudioError::RaggedChannels {
                channel: 1,
                len: 3,
                expected: 4
            }
        );
    }

    #[test]
    fn test_zero_channels_is_empty() {
        let audio = ChannelBuffers::new(vec![]).unwrap();
        assert_eq!(audio.channel_count(), 0);
        assert_eq!(audio.frames(), 0);
        assert!(audio.is_empty());
    }

    #[test]
    fn test_extend_from_block_adopts_channel_count() {
        let mut audio = ChannelBuffers::default();
        audio
            .extend_from_block(&[vec![1.0, 2.0], vec![3.0, 4.0]])
            .unwrap();
        audio.extend_from_block(&[vec![5.0], vec![6.0]]).unwrap();

        assert_eq!(audio.channel_count(), 2);
        assert_eq!(audio.channel(0), &[1.0, 2.0, 5.0]);
        assert_eq!(audio.channel(1), &[3.0, 4.0, 6.0]);
    }

    #[test]
    fn test_extend_from_block_rejects_channel_change() {
        let mut audio = ChannelBuffers::silent(2, 4);
        let err = audio.extend_from_block(&[vec![0.0; 4]]).unwrap_err();
        assert_eq!(
            err,
            AudioError::ChannelCountMismatch {
                expected: 2,
                found: 1
            }
        );
        assert_eq!(audio.frames(), 4);
    }

    #[test]
    fn test_interleave() {
        let audio = ChannelBuffers::new(vec![vec![0.0, 0.5], vec![1.0, 1.5]]).unwrap();
        assert_eq!(audio.interleave(), vec![0.0, 1.0, 0.5, 1.5]);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let audio = sine(440.0, 44100, 0.05, 2);
        let resampled = audio.resample(44100, 44100).unwrap();
        assert_eq!(resampled, audio);
    }

    #[test]
    fn test_resample_upsampling_scales_length() {
        let audio = sine(440.0, 44100, 0.1, 2);
        let resampled = audio.resample(44100, 48000).unwrap();

        assert_eq!(resampled.channel_count(), 2);
        let expected = (audio.frames() as f64 * 48000.0 / 44100.0) as i64;
        let tolerance = (expected as f64 * 0.03) as i64;
        assert!(
            (resampled.frames() as i64 - expected).abs() <= tolerance,
            "expected ~{} frames, got {}",
            expected,
            resampled.frames()
        );
    }

    #[test]
    fn test_resample_empty_keeps_channel_count() {
        let audio = ChannelBuffers::silent(2, 0);
        let resampled = audio.resample(44100, 48000).unwrap();
        assert_eq!(resampled.channel_count(), 2);
        assert_eq!(resampled.frames(), 0);
    }
}
