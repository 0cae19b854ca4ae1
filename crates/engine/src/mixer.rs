//! Playback mixing: selected clip's takes plus input pass-through.
//!
//! Callers must hand in blocks that already passed layout validation; these
//! functions only ever index within the shorter of two zipped buffers.

use crate::clip_store::ClipStore;
use crate::take::{ClipKey, Take};

/// Add every take of `clip` into `output`, in insertion order.
///
/// Unknown or empty clips leave `output` untouched.
pub fn mix_clip<O: AsMut<[f32]>>(store: &ClipStore, clip: ClipKey, position: u64, output: &mut [O]) {
    for take in store.takes(clip) {
        mix_take(take, position, output);
    }
}

/// Add one take into `output`, reading from `position` and wrapping at the
/// take's length.
///
/// Output channel `n` reads source channel `n % channel_count`, so a mono take
/// feeds every output channel.
pub fn mix_take<O: AsMut<[f32]>>(take: &Take, position: u64, output: &mut [O]) {
    let frames = take.frames();
    let channels = take.channel_count();
    if frames == 0 || channels == 0 {
        return;
    }

    let start = (position % frames as u64) as usize;
    for (out_ch, out) in output.iter_mut().enumerate() {
        let source = take.audio().channel(out_ch % channels);
        let mut pos = start;
        for sample in out.as_mut() {
            *sample += source[pos];
            pos += 1;
            if pos == frames {
                pos = 0;
            }
        }
    }
}

/// Sum `input` into `output` at unity gain, channel for channel.
pub fn pass_through<I: AsRef<[f32]>, O: AsMut<[f32]>>(input: &[I], output: &mut [O]) {
    for (inp, out) in input.iter().zip(output.iter_mut()) {
        for (i, o) in inp.as_ref().iter().zip(out.as_mut()) {
            *o += *i;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::take::TakeToken;
    use basedrop::{Collector, Owned};
    use looper_transport::ChannelBuffers;

    fn take(channels: Vec<Vec<f32>>) -> Take {
        Take::new(TakeToken(0), ChannelBuffers::new(channels).unwrap())
    }

    #[test]
    fn test_mix_take_wraps_at_length() {
        let take = take(vec![vec![1.0, 2.0, 3.0]]);
        let mut output = vec![vec![0.0; 5]];
        mix_take(&take, 1, &mut output);
        assert_eq!(output[0], vec![2.0, 3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_mix_take_position_beyond_length() {
        let take = take(vec![vec![1.0, 2.0, 3.0]]);
        let mut output = vec![vec![0.0; 2]];
        mix_take(&take, 7, &mut output);
        assert_eq!(output[0], vec![2.0, 3.0]);
    }

    #[test]
    fn test_mono_take_feeds_all_channels() {
        let take = take(vec![vec![0.5, 0.25]]);
        let mut output = vec![vec![0.0; 2], vec![0.0; 2]];
        mix_take(&take, 0, &mut output);
        assert_eq!(output[0], vec![0.5, 0.25]);
        assert_eq!(output[1], vec![0.5, 0.25]);
    }

    #[test]
    fn test_mix_is_additive() {
        let take = take(vec![vec![1.0; 4]]);
        let mut output = vec![vec![0.5; 4]];
        mix_take(&take, 0, &mut output);
        assert_eq!(output[0], vec![1.5; 4]);
    }

    #[test]
    fn test_empty_take_is_noop() {
        let take = take(vec![vec![]]);
        let mut output = vec![vec![0.3; 4]];
        mix_take(&take, 12, &mut output);
        assert_eq!(output[0], vec![0.3; 4]);
    }

    #[test]
    fn test_mix_clip_sums_all_takes() {
        let collector = Collector::new();
        let handle = collector.handle();
        let mut store = ClipStore::with_capacity(2, 4, 4);
        for value in [0.25, 0.5] {
            store
                .insert(ClipKey(0), Owned::new(&handle, take(vec![vec![value; 8]])))
                .ok()
                .unwrap();
        }

        let mut output = vec![vec![0.0; 4], vec![0.0; 4]];
        mix_clip(&store, ClipKey(0), 0, &mut output);
        assert_eq!(output[0], vec![0.75; 4]);
        assert_eq!(output[1], vec![0.75; 4]);

        let mut silent = vec![vec![0.0; 4]];
        mix_clip(&store, ClipKey(1), 0, &mut silent);
        assert_eq!(silent[0], vec![0.0; 4]);
    }

    #[test]
    fn test_pass_through_adds_input() {
        let input = vec![vec![0.125, 0.25], vec![0.5, 0.75]];
        let mut output = vec![vec![1.0, 1.0], vec![2.0, 2.0]];
        pass_through(&input, &mut output);
        assert_eq!(output[0], vec![1.125, 1.25]);
        assert_eq!(output[1], vec![2.5, 2.75]);
    }
}
