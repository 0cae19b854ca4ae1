use looper_transport::{AudioError, BufferChunk, ChannelBuffers};

/// A finished recording, assembled from the engine's buffer chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTake {
    pub clip_id: String,
    pub audio: ChannelBuffers,
    /// Token the take was loaded back under, if it was.
    pub token: Option<String>,
}

/// Concatenates captured chunks until the engine finalizes the recording.
#[derive(Debug, Default)]
pub struct TakeAssembler {
    audio: ChannelBuffers,
}

impl TakeAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &BufferChunk) -> Result<(), AudioError> {
        let slices: Vec<&[f32]> = chunk
            .channels
            .iter()
            .map(|channel| {
                let end = chunk.end_sample.min(channel.len());
                let start = chunk.start_sample.min(end);
                &channel[start..end]
            })
            .collect();
        self.audio.extend_from_block(&slices)
    }

    pub fn frames(&self) -> usize {
        self.audio.frames()
    }

    /// Hand out what was captured and start over. `None` when nothing was
    /// captured, e.g. a recording made with no input connected.
    pub fn finish(&mut self, clip_id: &str) -> Option<RecordedTake> {
        let audio = std::mem::take(&mut self.audio);
        if audio.frames() == 0 {
            return None;
        }
        Some(RecordedTake {
            clip_id: clip_id.to_string(),
            audio,
            token: None,
        })
    }

    pub fn clear(&mut self) {
        self.audio = ChannelBuffers::default();
    }
}
