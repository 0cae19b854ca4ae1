use looper_engine::{ChannelError, ControlChannel, EngineStreams, LoopEngine, mailbox};
use looper_transport::{
    AudioError, ChannelBuffers, ControlMessage, EngineEvent, LoopConfig, MessageError,
    TransportSnapshot,
};
use serde::Deserialize;

use crate::config::LooperConfig;
use crate::recorder::{RecordedTake, TakeAssembler};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// One line of host input: a control message, or a transport update wrapped
/// as `{"transport": {...}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Control(ControlMessage),
    Transport(TransportSnapshot),
}

impl Inbound {
    pub fn from_json(line: &str) -> Result<Self, MessageError> {
        let value: serde_json::Value = serde_json::from_str(line)?;
        if let Some(transport) = value.get("transport") {
            return Ok(Self::Transport(TransportSnapshot::deserialize(transport)?));
        }
        Ok(Self::Control(ControlMessage::from_value(value)?))
    }
}

/// Control-context side of a running looper.
///
/// Wraps the engine's [`ControlChannel`], logs what goes in and out, and
/// turns captured buffer chunks into [`RecordedTake`]s.
pub struct Session {
    control: ControlChannel,
    sample_rate: u32,
    auto_load_recordings: bool,
    assembler: TakeAssembler,
    recordings: u64,
    recorded: Vec<RecordedTake>,
    streams: Option<EngineStreams>,
}

impl Session {
    pub fn new(control: ControlChannel, sample_rate: u32, auto_load_recordings: bool) -> Self {
        Self {
            control,
            sample_rate,
            auto_load_recordings,
            assembler: TakeAssembler::new(),
            recordings: 0,
            recorded: Vec::new(),
            streams: None,
        }
    }

    /// Start the engine on the default audio devices.
    pub fn start(config: &LooperConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let handle = looper_engine::start(config.engine_config())?;
        let (control, streams) = handle.into_parts();
        log::info!(
            "looper running at {} Hz, {} channels, input {}",
            streams.sample_rate,
            streams.channels,
            if streams.has_input() { "on" } else { "off" }
        );

        let mut session = Self::new(control, streams.sample_rate, config.auto_load_recordings);
        session.streams = Some(streams);
        Ok(session)
    }

    /// A session paired with an engine the caller drives itself, e.g. for
    /// offline rendering.
    pub fn offline(config: &LooperConfig) -> (Self, LoopEngine) {
        let engine_config = config.engine_config();
        let (control, mailbox) = mailbox(&engine_config);
        let session = Self::new(control, config.sample_rate, config.auto_load_recordings);
        (session, LoopEngine::new(engine_config, mailbox))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn streams(&self) -> Option<&EngineStreams> {
        self.streams.as_ref()
    }

    pub fn control(&self) -> &ControlChannel {
        &self.control
    }

    pub fn send(&mut self, message: ControlMessage) -> Result<(), SessionError> {
        log::debug!("sending {} message", message.action());
        self.control.send(message)?;
        Ok(())
    }

    /// Parse and apply one line of host input.
    pub fn handle_json(&mut self, line: &str) -> Result<(), SessionError> {
        match Inbound::from_json(line)? {
            Inbound::Control(message) => self.send(message),
            Inbound::Transport(transport) => self.update_transport(transport),
        }
    }

    pub fn record(&mut self, recording: bool) -> Result<(), SessionError> {
        self.send(ControlMessage::Record { recording })
    }

    pub fn load(
        &mut self,
        clip_id: &str,
        token: &str,
        audio: ChannelBuffers,
    ) -> Result<(), SessionError> {
        log::debug!(
            "loading take {token} into clip {clip_id}: {} channels, {} frames",
            audio.channel_count(),
            audio.frames()
        );
        self.control.load(clip_id, token, audio)?;
        Ok(())
    }

    /// Load audio recorded or decoded at `sample_rate`, resampling it to the
    /// engine rate first when they differ.
    pub fn load_with_rate(
        &mut self,
        clip_id: &str,
        token: &str,
        audio: ChannelBuffers,
        sample_rate: u32,
    ) -> anyhow::Result<()> {
        let audio = if sample_rate == self.sample_rate {
            audio
        } else {
            log::debug!("resampling take {token} from {sample_rate} Hz to {} Hz", self.sample_rate);
            audio.resample(sample_rate, self.sample_rate)?
        };
        self.load(clip_id, token, audio)?;
        Ok(())
    }

    pub fn delete(&mut self, clip_id: &str, token: &str) -> Result<(), SessionError> {
        self.send(ControlMessage::Delete {
            clip_id: clip_id.to_string(),
            token: token.to_string(),
        })
    }

    pub fn play(&mut self, clip_id: &str) -> Result<(), SessionError> {
        self.send(ControlMessage::Play {
            clip_id: clip_id.to_string(),
        })
    }

    pub fn set_loop(
        &mut self,
        clip_id: &str,
        token: &str,
        loop_config: LoopConfig,
    ) -> Result<(), SessionError> {
        self.send(ControlMessage::Loop {
            clip_id: clip_id.to_string(),
            token: token.to_string(),
            loop_config,
        })
    }

    pub fn update_transport(&mut self, transport: TransportSnapshot) -> Result<(), SessionError> {
        self.control.update_transport(transport)?;
        Ok(())
    }

    /// Drain engine events. Captured chunks are accumulated and each finalize
    /// closes the current recording.
    pub fn poll(&mut self) -> Vec<EngineEvent> {
        let events = self.control.poll();
        for event in &events {
            match event {
                EngineEvent::Buffer(chunk) => {
                    if let Err(err) = self.assembler.push(chunk) {
                        log::warn!("discarding captured audio: {err}");
                        self.assembler.clear();
                    }
                }
                EngineEvent::Finalize { clip_id } => self.finish_recording(clip_id),
                EngineEvent::Error { error } => log::warn!("engine: {error}"),
                EngineEvent::Transport(_) => {}
            }
        }
        events
    }

    /// Recordings finished since the last call.
    pub fn drain_recorded(&mut self) -> Vec<RecordedTake> {
        std::mem::take(&mut self.recorded)
    }

    fn finish_recording(&mut self, clip_id: &str) {
        let Some(mut take) = self.assembler.finish(clip_id) else {
            log::info!("recording on clip {clip_id} captured no audio");
            return;
        };
        log::info!(
            "recorded {:.2}s on clip {clip_id}",
            take.audio.duration_secs(self.sample_rate)
        );

        if self.auto_load_recordings {
            let token = format!("rec-{}", self.recordings);
            match self.control.load(clip_id, &token, take.audio.clone()) {
                Ok(()) => take.token = Some(token),
                Err(err) => log::warn!("could not load recording into clip {clip_id}: {err}"),
            }
        }
        self.recordings += 1;
        self.recorded.push(take);
    }
}
