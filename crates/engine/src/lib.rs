pub mod channel;
pub mod clip_store;
mod engine;
pub mod error;
pub mod hook;
mod host;
pub mod mixer;
pub mod recording;
pub mod take;

use looper_transport::TransportSnapshot;

pub use channel::{ChannelError, Command, ControlChannel, Mailbox, Status, mailbox};
pub use clip_store::{ClipStore, TakeHandle};
pub use engine::LoopEngine;
pub use error::{BlockError, EngineError};
pub use hook::{BlockHook, HookContext, HookError};
pub use host::{AudioEngineHandle, EngineClock, EngineStreams, start};
pub use recording::{RecordingSession, RecordingState, Transition};
pub use take::{ClipKey, Take, TakeToken};

/// Fixed sizes the engine is built with. Nothing on the audio thread grows
/// past these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub channels: usize,
    /// Largest block `process_block` accepts.
    pub max_block_frames: usize,
    pub command_capacity: usize,
    pub status_capacity: usize,
    pub max_clips: usize,
    pub max_takes: usize,
    pub max_takes_per_clip: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            max_block_frames: 128,
            command_capacity: 256,
            status_capacity: 1024,
            max_clips: 64,
            max_takes: 512,
            max_takes_per_clip: 32,
        }
    }
}

/// A render processor driven by a host.
///
/// The host owns the call lifecycle: it feeds transport updates and control
/// commands whenever it has them and calls `process_block` once per block.
pub trait AudioProcessor {
    /// Render one block at audio-clock time `now` (seconds).
    ///
    /// `input` is either empty or has one buffer per output channel; every
    /// buffer has the same length.
    fn process_block<I, O>(
        &mut self,
        now: f64,
        input: &[I],
        output: &mut [O],
    ) -> Result<(), BlockError>
    where
        I: AsRef<[f32]>,
        O: AsMut<[f32]>;

    fn on_control_message(&mut self, command: Command);

    fn on_transport_update(&mut self, transport: TransportSnapshot);
}
