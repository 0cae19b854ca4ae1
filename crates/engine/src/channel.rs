//! Message passing between the control context and the render context.
//!
//! The control side owns a [`ControlChannel`]; the engine owns the matching
//! [`Mailbox`]. Both directions are single-producer/single-consumer `rtrb`
//! rings. Control messages and transport updates share one ring, so the
//! engine sees them in the order they were sent.

use std::collections::HashMap;

use basedrop::{Collector, Handle, Owned};
use looper_transport::{
    AudioError, BufferChunk, ChannelBuffers, ControlMessage, EngineEvent, LoopConfig,
    TransportSnapshot,
};

use crate::EngineConfig;
use crate::error::EngineError;
use crate::take::{ClipKey, Take, TakeToken};

/// Control → render.
pub enum Command {
    Record(bool),
    Load { clip: ClipKey, take: Owned<Take> },
    Delete { clip: ClipKey, token: TakeToken },
    Play(ClipKey),
    Loop {
        clip: ClipKey,
        token: TakeToken,
        config: LoopConfig,
    },
    Transport(TransportSnapshot),
}

/// Render → control.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Transport(TransportSnapshot),
    Buffer {
        start_sample: usize,
        end_sample: usize,
        channels: Vec<Vec<f32>>,
    },
    Finalize(ClipKey),
    Error(EngineError),
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("engine mailbox is full")]
    MailboxFull,

    #[error("invalid take buffer: {0}")]
    InvalidBuffer(#[from] AudioError),
}

/// Render-side ends of the rings.
pub struct Mailbox {
    pub(crate) commands: rtrb::Consumer<Command>,
    pub(crate) status: rtrb::Producer<Status>,
}

/// Create a connected control channel and engine mailbox.
pub fn mailbox(config: &EngineConfig) -> (ControlChannel, Mailbox) {
    let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(config.command_capacity);
    let (status_tx, status_rx) = rtrb::RingBuffer::<Status>::new(config.status_capacity);
    let collector = Collector::new();
    let handle = collector.handle();

    let control = ControlChannel {
        commands: command_tx,
        status: status_rx,
        collector,
        handle,
        clips: NameTable::default(),
        tokens: NameTable::default(),
        channels: config.channels,
    };
    let mailbox = Mailbox {
        commands: command_rx,
        status: status_tx,
    };
    (control, mailbox)
}

/// String to id interning. Entries are never evicted: a name must map to the
/// same id for as long as commands carrying it may still be in flight, and a
/// deleted take's token is commonly loaded again. Memory grows with the
/// number of distinct names ever sent.
#[derive(Debug, Default)]
struct NameTable {
    names: Vec<String>,
    ids: HashMap<String, u32>,
}

impl NameTable {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    fn lookup(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }
}

/// Control-side end: turns wire messages into engine commands and engine
/// statuses back into wire events.
pub struct ControlChannel {
    commands: rtrb::Producer<Command>,
    status: rtrb::Consumer<Status>,
    collector: Collector,
    handle: Handle,
    clips: NameTable,
    tokens: NameTable,
    channels: usize,
}

impl ControlChannel {
    pub fn send(&mut self, message: ControlMessage) -> Result<(), ChannelError> {
        match message {
            ControlMessage::Record { recording } => self.push(Command::Record(recording)),
            ControlMessage::Load {
                clip_id,
                token,
                buffer,
            } => {
                let audio = ChannelBuffers::new(buffer)?;
                self.load(&clip_id, &token, audio)
            }
            ControlMessage::Delete { clip_id, token } => {
                // A name never seen cannot have a take behind it.
                match (self.clips.lookup(&clip_id), self.tokens.lookup(&token)) {
                    (Some(clip), Some(token)) => self.push(Command::Delete {
                        clip: ClipKey(clip),
                        token: TakeToken(token),
                    }),
                    _ => Ok(()),
                }
            }
            ControlMessage::Play { clip_id } => {
                let clip = ClipKey(self.clips.intern(&clip_id));
                self.push(Command::Play(clip))
            }
            ControlMessage::Loop {
                clip_id,
                token,
                loop_config,
            } => match (self.clips.lookup(&clip_id), self.tokens.lookup(&token)) {
                (Some(clip), Some(token)) => self.push(Command::Loop {
                    clip: ClipKey(clip),
                    token: TakeToken(token),
                    config: loop_config,
                }),
                _ => Ok(()),
            },
        }
    }

    /// Send an already validated take.
    pub fn load(
        &mut self,
        clip_id: &str,
        token: &str,
        audio: ChannelBuffers,
    ) -> Result<(), ChannelError> {
        let clip = ClipKey(self.clips.intern(clip_id));
        let token = TakeToken(self.tokens.intern(token));
        let take = Owned::new(&self.handle, Take::new(token, audio));
        self.push(Command::Load { clip, take })
    }

    pub fn update_transport(&mut self, transport: TransportSnapshot) -> Result<(), ChannelError> {
        self.push(Command::Transport(transport))
    }

    /// Drain everything the engine has reported since the last poll, and
    /// reclaim takes the engine has let go of.
    ///
    /// Captured frames the engine had to drop come back as a silent buffer
    /// chunk ahead of the error, so a recording keeps its length.
    pub fn poll(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(status) = self.status.pop() {
            if let Status::Error(EngineError::CaptureDropped { frames }) = status {
                let frames = frames as usize;
                events.push(EngineEvent::Buffer(BufferChunk {
                    start_sample: 0,
                    end_sample: frames,
                    channels: vec![vec![0.0; frames]; self.channels],
                }));
            }
            events.push(self.to_event(status));
        }
        self.collector.collect();
        events
    }

    pub fn clip_key(&self, clip_id: &str) -> Option<ClipKey> {
        self.clips.lookup(clip_id).map(ClipKey)
    }

    pub fn clip_id(&self, clip: ClipKey) -> Option<&str> {
        self.clips.name(clip.0)
    }

    pub fn token(&self, token: &str) -> Option<TakeToken> {
        self.tokens.lookup(token).map(TakeToken)
    }

    /// Free slots in the command ring.
    pub fn slots(&self) -> usize {
        self.commands.slots()
    }

    fn push(&mut self, command: Command) -> Result<(), ChannelError> {
        self.commands
            .push(command)
            .map_err(|_| ChannelError::MailboxFull)
    }

    fn to_event(&self, status: Status) -> EngineEvent {
        match status {
            Status::Transport(transport) => EngineEvent::Transport(transport),
            Status::Buffer {
                start_sample,
                end_sample,
                channels,
            } => EngineEvent::Buffer(BufferChunk {
                start_sample,
                end_sample,
                channels,
            }),
            Status::Finalize(clip) => EngineEvent::Finalize {
                clip_id: self
                    .clip_id(clip)
                    .map_or_else(|| format!("#{}", clip.0), str::to_string),
            },
            Status::Error(error) => EngineEvent::Error {
                error: error.to_string(),
            },
        }
    }
}
