use looper_transport::{TransportClock, TransportSnapshot};

use crate::channel::{Command, Mailbox, Status};
use crate::clip_store::ClipStore;
use crate::error::{BlockError, EngineError};
use crate::hook::{BlockHook, HookContext, HookSlot};
use crate::mixer;
use crate::recording::{RecordingSession, Transition};
use crate::take::ClipKey;
use crate::{AudioProcessor, EngineConfig};

/// Transport-synchronized looper/recorder.
///
/// Each block runs, in order: mailbox drain, transport/recording transition,
/// input capture, take mix, input pass-through, hooks.
pub struct LoopEngine {
    config: EngineConfig,
    mailbox: Mailbox,
    clips: ClipStore,
    session: RecordingSession,
    clock: TransportClock,
    transport: Option<TransportSnapshot>,
    hooks: Vec<HookSlot>,
    /// A finalize waiting for room in the status ring, with the capture gap
    /// that must be reported ahead of it.
    pending_finalize: Option<(ClipKey, u64)>,
    /// Captured frames of the current recording that never reached the ring.
    capture_gap: u64,
    dropped_statuses: u64,
}

impl LoopEngine {
    pub fn new(config: EngineConfig, mailbox: Mailbox) -> Self {
        Self {
            config,
            mailbox,
            clips: ClipStore::with_capacity(
                config.max_clips,
                config.max_takes,
                config.max_takes_per_clip,
            ),
            session: RecordingSession::new(),
            clock: TransportClock::new(),
            transport: None,
            hooks: Vec::new(),
            pending_finalize: None,
            capture_gap: 0,
            dropped_statuses: 0,
        }
    }

    /// Install a hook. Hooks can only be added before the engine is handed to
    /// the audio thread.
    pub fn with_hook(mut self, hook: impl BlockHook + 'static) -> Self {
        self.hooks.push(HookSlot::new(Box::new(hook)));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn clips(&self) -> &ClipStore {
        &self.clips
    }

    pub fn transport(&self) -> Option<&TransportSnapshot> {
        self.transport.as_ref()
    }

    /// Beat position as of the last block; held while stopped.
    pub fn beat_position(&self) -> f64 {
        self.clock.position()
    }

    /// Hooks that have not been disabled by a failure.
    pub fn active_hooks(&self) -> usize {
        self.hooks.iter().filter(|slot| slot.is_enabled()).count()
    }

    /// Statuses that could not be delivered because the status ring was full.
    pub fn dropped_statuses(&self) -> u64 {
        self.dropped_statuses
    }

    fn validate<I, O>(&self, input: &[I], output: &mut [O]) -> Result<usize, BlockError>
    where
        I: AsRef<[f32]>,
        O: AsMut<[f32]>,
    {
        let expected = self.config.channels;
        if output.len() != expected {
            return Err(BlockError::OutputChannels {
                expected,
                found: output.len(),
            });
        }

        let frames = output.first_mut().map_or(0, |c| c.as_mut().len());
        if frames > self.config.max_block_frames {
            return Err(BlockError::TooLong {
                max: self.config.max_block_frames,
                found: frames,
            });
        }
        for (channel, out) in output.iter_mut().enumerate() {
            let found = out.as_mut().len();
            if found != frames {
                return Err(BlockError::Frames {
                    channel,
                    expected: frames,
                    found,
                });
            }
        }

        if input.is_empty() {
            return Ok(frames);
        }
        if input.len() != output.len() {
            return Err(BlockError::InputChannels {
                expected: output.len(),
                found: input.len(),
            });
        }
        for (channel, inp) in input.iter().enumerate() {
            let found = inp.as_ref().len();
            if found != frames {
                return Err(BlockError::Frames {
                    channel,
                    expected: frames,
                    found,
                });
            }
        }
        Ok(frames)
    }

    fn drain_mailbox(&mut self) {
        while let Ok(command) = self.mailbox.commands.pop() {
            self.on_control_message(command);
        }
    }

    fn emit(&mut self, status: Status) {
        if self.mailbox.status.push(status).is_err() {
            self.dropped_statuses += 1;
        }
    }

    fn report(&mut self, error: EngineError) {
        self.emit(Status::Error(error));
    }

    fn finalize(&mut self, clip: ClipKey) {
        let gap = std::mem::take(&mut self.capture_gap);
        if let Some(pending) = self.deliver_finalize(clip, gap)
            && self.pending_finalize.replace(pending).is_some()
        {
            self.dropped_statuses += 1;
        }
    }

    fn flush_pending_finalize(&mut self) {
        if let Some((clip, gap)) = self.pending_finalize.take() {
            self.pending_finalize = self.deliver_finalize(clip, gap);
        }
    }

    /// Push the gap report (if any) and the finalize, in that order. Returns
    /// whatever is still undelivered.
    fn deliver_finalize(&mut self, clip: ClipKey, gap: u64) -> Option<(ClipKey, u64)> {
        if gap > 0 && !self.report_gap(gap) {
            return Some((clip, gap));
        }
        if self.mailbox.status.push(Status::Finalize(clip)).is_err() {
            return Some((clip, 0));
        }
        None
    }

    fn report_gap(&mut self, frames: u64) -> bool {
        let status = Status::Error(EngineError::CaptureDropped { frames });
        self.mailbox.status.push(status).is_ok()
    }

    fn skip_capture(&mut self, frames: usize) {
        self.capture_gap += frames as u64;
        self.dropped_statuses += 1;
    }

    fn capture<I: AsRef<[f32]>>(&mut self, input: &[I], frames: usize) {
        // Chunks of a new recording must not overtake the previous finalize.
        if self.pending_finalize.is_some() {
            self.skip_capture(frames);
            return;
        }
        if self.capture_gap > 0 {
            if !self.report_gap(self.capture_gap) {
                self.skip_capture(frames);
                return;
            }
            self.capture_gap = 0;
        }
        if self.mailbox.status.is_full() {
            self.skip_capture(frames);
            return;
        }
        // The host reuses its buffers after the block returns.
        let channels = input.iter().map(|c| c.as_ref().to_vec()).collect();
        self.emit(Status::Buffer {
            start_sample: 0,
            end_sample: frames,
            channels,
        });
    }

    fn run_hooks(&mut self, context: &HookContext) {
        for index in 0..self.hooks.len() {
            if let Some(error) = self.hooks[index].run(context) {
                self.report(error);
            }
        }
    }
}

impl AudioProcessor for LoopEngine {
    fn process_block<I, O>(
        &mut self,
        now: f64,
        input: &[I],
        output: &mut [O],
    ) -> Result<(), BlockError>
    where
        I: AsRef<[f32]>,
        O: AsMut<[f32]>,
    {
        let frames = self.validate(input, output)?;

        self.flush_pending_finalize();
        self.drain_mailbox();

        let transport = self.transport;
        let playing = transport.is_some_and(|t| t.playing);
        let beat_position = self.clock.advance(transport.as_ref(), now);

        match self.session.on_transport(playing) {
            Transition::Finalized(clip) => self.finalize(clip),
            Transition::RecordingSkipped => self.report(EngineError::NoClipSelected),
            _ => {}
        }
        if !playing {
            return Ok(());
        }

        if self.session.is_active() && !input.is_empty() {
            self.capture(input, frames);
        }

        let position = self.session.samples_elapsed();
        if let Some(clip) = self.session.playing_clip() {
            mixer::mix_clip(&self.clips, clip, position, output);
        }
        self.session.advance(frames);

        mixer::pass_through(input, output);

        if let Some(transport) = transport
            && !self.hooks.is_empty()
        {
            self.run_hooks(&HookContext {
                now,
                beat_position,
                samples_elapsed: position,
                frames,
                sample_rate: self.config.sample_rate,
                transport,
            });
        }
        Ok(())
    }

    fn on_control_message(&mut self, command: Command) {
        match command {
            Command::Record(true) => self.session.arm(),
            Command::Record(false) => self.session.disarm(),
            Command::Load { clip, take } => {
                if let Err(rejected) = self.clips.insert(clip, take) {
                    self.report(rejected.reason);
                }
            }
            Command::Delete { clip, token } => {
                // Dropping the Owned take queues it for the control side's collector.
                drop(self.clips.remove(clip, token));
            }
            Command::Play(clip) => self.session.select(clip),
            Command::Loop {
                clip,
                token,
                config,
            } => {
                let sample_rate = self.config.sample_rate;
                let transport = self.transport;
                if let Some(take) = self.clips.find_mut(clip, token) {
                    take.set_loop(config, transport.as_ref(), sample_rate);
                }
            }
            Command::Transport(transport) => self.on_transport_update(transport),
        }
    }

    fn on_transport_update(&mut self, transport: TransportSnapshot) {
        self.transport = Some(transport);
        self.emit(Status::Transport(transport));
    }
}
