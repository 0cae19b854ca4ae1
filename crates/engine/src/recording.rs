use crate::take::ClipKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Armed,
    Active,
}

/// What a block's transport state did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Stopped, and was already stopped or not recording.
    Stopped,
    /// Transport stopped while recording on this clip.
    Finalized(ClipKey),
    /// Transport just started without recording.
    Started,
    /// Transport just started and recording began on this clip.
    RecordingStarted(ClipKey),
    /// Transport just started while armed, but no clip was selected.
    RecordingSkipped,
    /// Still playing.
    Rolling,
}

/// Arm/record/finalize state machine, driven by control messages and by the
/// transport's play state at each block.
#[derive(Debug, Clone, Default)]
pub struct RecordingSession {
    armed: bool,
    active: bool,
    recording_clip: Option<ClipKey>,
    playing_clip: Option<ClipKey>,
    samples_elapsed: u64,
    was_playing: bool,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Only affects the next transport start; a capture in flight keeps going
    /// until the transport stops.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Select the clip to play back. Does not reset `samples_elapsed`.
    pub fn select(&mut self, clip: ClipKey) {
        self.playing_clip = Some(clip);
    }

    pub fn on_transport(&mut self, playing: bool) -> Transition {
        if !playing {
            self.was_playing = false;
            if self.active {
                self.active = false;
                if let Some(clip) = self.recording_clip {
                    return Transition::Finalized(clip);
                }
            }
            return Transition::Stopped;
        }

        if self.was_playing {
            return Transition::Rolling;
        }

        self.was_playing = true;
        self.samples_elapsed = 0;

        if !self.armed {
            return Transition::Started;
        }
        match self.playing_clip {
            Some(clip) => {
                self.recording_clip = Some(clip);
                self.active = true;
                Transition::RecordingStarted(clip)
            }
            None => Transition::RecordingSkipped,
        }
    }

    pub fn advance(&mut self, frames: usize) {
        self.samples_elapsed += frames as u64;
    }

    pub fn state(&self) -> RecordingState {
        if self.active {
            RecordingState::Active
        } else if self.armed {
            RecordingState::Armed
        } else {
            RecordingState::Idle
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn recording_clip(&self) -> Option<ClipKey> {
        self.recording_clip
    }

    pub fn playing_clip(&self) -> Option<ClipKey> {
        self.playing_clip
    }

    pub fn samples_elapsed(&self) -> u64 {
        self.samples_elapsed
    }

    pub fn was_playing(&self) -> bool {
        self.was_playing
    }
}
