/// Problems the render context reports back without failing the block.
///
/// Everything here is `Copy` so reporting never allocates on the audio thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("recording armed but no clip selected for playback")]
    NoClipSelected,

    #[error("clip limit of {max} reached")]
    ClipCapacity { max: usize },

    #[error("take limit of {max} reached")]
    TakeCapacity { max: usize },

    #[error("clip already holds {max} takes")]
    ClipFull { max: usize },

    #[error("block hook '{hook}' failed and was disabled: {reason}")]
    HookFailed {
        hook: &'static str,
        reason: &'static str,
    },

    #[error("block hook '{hook}' panicked and was disabled")]
    HookPanicked { hook: &'static str },

    /// Frames of the current recording that could not be sent. The control
    /// side fills them with silence so later chunks stay in place.
    #[error("status ring full, {frames} captured frames replaced with silence")]
    CaptureDropped { frames: u64 },
}

/// A render block whose buffers do not match the engine's layout.
///
/// Returned before any buffer is read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("output has {found} channels, engine is configured for {expected}")]
    OutputChannels { expected: usize, found: usize },

    #[error("input has {found} channels, output has {expected}")]
    InputChannels { expected: usize, found: usize },

    #[error("channel {channel} has {found} frames, expected {expected}")]
    Frames {
        channel: usize,
        expected: usize,
        found: usize,
    },

    #[error("block of {found} frames exceeds the maximum of {max}")]
    TooLong { max: usize, found: usize },
}
