use looper_transport::{ChannelBuffers, LoopBounds, LoopConfig, TransportSnapshot, loop_bounds};

/// Interned clip identifier. The control side maps wire strings to keys so the
/// render context never handles strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipKey(pub u32);

/// Interned take token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TakeToken(pub u32);

/// One recorded buffer plus its loop settings.
#[derive(Debug, Clone)]
pub struct Take {
    token: TakeToken,
    audio: ChannelBuffers,
    loop_config: LoopConfig,
    loop_bounds: Option<LoopBounds>,
}

impl Take {
    pub fn new(token: TakeToken, audio: ChannelBuffers) -> Self {
        Self {
            token,
            audio,
            loop_config: LoopConfig::default(),
            loop_bounds: None,
        }
    }

    pub fn token(&self) -> TakeToken {
        self.token
    }

    pub fn audio(&self) -> &ChannelBuffers {
        &self.audio
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.audio.frames()
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.audio.channel_count()
    }

    pub fn loop_config(&self) -> &LoopConfig {
        &self.loop_config
    }

    /// Boundaries derived the last time an enabled config was applied.
    ///
    /// Playback does not consult these yet; takes always wrap at their own length.
    pub fn loop_bounds(&self) -> Option<LoopBounds> {
        self.loop_bounds
    }

    /// Apply a loop config, deriving sample bounds from the transport as it is now.
    ///
    /// Bounds are only recomputed for an enabled config, and are not refreshed
    /// by later tempo changes. Without usable timing the bounds are cleared.
    pub fn set_loop(
        &mut self,
        config: LoopConfig,
        transport: Option<&TransportSnapshot>,
        sample_rate: u32,
    ) {
        self.loop_config = config;
        if config.enabled {
            self.loop_bounds = transport.and_then(|t| loop_bounds(&config, t, sample_rate));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take() -> Take {
        Take::new(TakeToken(1), ChannelBuffers::silent(2, 16))
    }

    #[test]
    fn test_new_take_has_default_loop() {
        let take = take();
        assert_eq!(take.loop_config(), &LoopConfig::default());
        assert_eq!(take.loop_bounds(), None);
        assert_eq!(take.frames(), 16);
        assert_eq!(take.channel_count(), 2);
    }

    #[test]
    fn test_set_loop_uses_transport_at_receipt() {
        let mut take = take();
        let transport = TransportSnapshot::playing_at(120.0, 4, 0.0, 0.0);
        let config = LoopConfig {
            enabled: true,
            start_bar: 2.0,
            loop_length: 2.0,
        };
        take.set_loop(config, Some(&transport), 44100);

        let bounds = take.loop_bounds().unwrap();
        assert_eq!(bounds.start_sample, 4 * 44100);
        assert_eq!(bounds.length_samples, 4 * 44100);
    }

    #[test]
    fn test_disabled_loop_keeps_previous_bounds() {
        let mut take = take();
        let transport = TransportSnapshot::playing_at(120.0, 4, 0.0, 0.0);
        let enabled = LoopConfig {
            enabled: true,
            start_bar: 1.0,
            loop_length: 1.0,
        };
        take.set_loop(enabled, Some(&transport), 48000);
        let before = take.loop_bounds();

        let faster = TransportSnapshot {
            tempo: 240.0,
            ..transport
        };
        take.set_loop(
            LoopConfig {
                enabled: false,
                ..enabled
            },
            Some(&faster),
            48000,
        );

        assert!(!take.loop_config().enabled);
        assert_eq!(take.loop_bounds(), before);
    }

    #[test]
    fn test_enabled_loop_without_transport_clears_bounds() {
        let mut take = take();
        take.set_loop(
            LoopConfig {
                enabled: true,
                ..LoopConfig::default()
            },
            None,
            48000,
        );
        assert!(take.loop_config().enabled);
        assert_eq!(take.loop_bounds(), None);
    }
}
