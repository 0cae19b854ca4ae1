//! Wire messages exchanged between the control side and the engine.
//!
//! Inbound messages are tagged by `action`. Outbound events keep the shapes
//! existing front-ends already listen for, so they are mapped through a private
//! wire representation instead of being derived directly.

use serde::{Deserialize, Serialize};

use crate::timing::{LoopConfig, TransportSnapshot};

const ACTIONS: [&str; 5] = ["record", "load", "delete", "play", "loop"];

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("message has no action")]
    MissingAction,
}

/// A control-side request. Takes effect at the next block boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ControlMessage {
    /// Arm (`true`) or disarm recording for the next transport start.
    Record { recording: bool },
    /// Append a take to a clip. `buffer` holds one sample buffer per channel.
    Load {
        clip_id: String,
        token: String,
        buffer: Vec<Vec<f32>>,
    },
    Delete { clip_id: String, token: String },
    /// Select the clip that plays back (and that the next recording targets).
    Play { clip_id: String },
    Loop {
        clip_id: String,
        token: String,
        #[serde(rename = "loop")]
        loop_config: LoopConfig,
    },
}

impl ControlMessage {
    /// Parse a message, rejecting anything outside the known actions.
    ///
    /// Extra fields (such as a `source` tag) are ignored.
    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, MessageError> {
        let action = value
            .get("action")
            .and_then(serde_json::Value::as_str)
            .ok_or(MessageError::MissingAction)?;
        if !ACTIONS.contains(&action) {
            return Err(MessageError::UnknownAction(action.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn action(&self) -> &'static str {
        match self {
            ControlMessage::Record { .. } => "record",
            ControlMessage::Load { .. } => "load",
            ControlMessage::Delete { .. } => "delete",
            ControlMessage::Play { .. } => "play",
            ControlMessage::Loop { .. } => "loop",
        }
    }
}

/// One block of captured input, deep-copied out of the render callback.
///
/// `start_sample..end_sample` is the slice of the render block it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferChunk {
    pub start_sample: usize,
    pub end_sample: usize,
    pub channels: Vec<Vec<f32>>,
}

/// Everything the engine reports back to the control side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireEvent", from = "WireEvent")]
pub enum EngineEvent {
    /// Echo of a transport update the engine received.
    Transport(TransportSnapshot),
    Buffer(BufferChunk),
    /// A recording on `clip_id` ended.
    Finalize { clip_id: String },
    /// Non-fatal diagnostic.
    Error { error: String },
}

impl EngineEvent {
    pub fn to_json(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireEvent {
    Action(ActionEvent),
    Buffer {
        buffer: BufferChunk,
    },
    Transport {
        event: TransportTag,
        transport: TransportSnapshot,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase", rename_all_fields = "camelCase")]
enum ActionEvent {
    Finalize { clip_id: String },
    Error { error: String },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TransportTag {
    Transport,
}

impl From<EngineEvent> for WireEvent {
    fn from(event: EngineEvent) -> Self {
        match event {
            EngineEvent::Transport(transport) => WireEvent::Transport {
                event: TransportTag::Transport,
                transport,
            },
            EngineEvent::Buffer(buffer) => WireEvent::Buffer { buffer },
            EngineEvent::Finalize { clip_id } => {
                WireEvent::Action(ActionEvent::Finalize { clip_id })
            }
            EngineEvent::Error { error } => WireEvent::Action(ActionEvent::Error { error }),
        }
    }
}

impl From<WireEvent> for EngineEvent {
    fn from(wire: WireEvent) -> Self {
        match wire {
            WireEvent::Transport { transport, .. } => EngineEvent::Transport(transport),
            WireEvent::Buffer { buffer } => EngineEvent::Buffer(buffer),
            WireEvent::Action(ActionEvent::Finalize { clip_id }) => {
                EngineEvent::Finalize { clip_id }
            }
            WireEvent::Action(ActionEvent::Error { error }) => EngineEvent::Error { error },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_record() {
        let msg = ControlMessage::from_json(r#"{"action":"record","recording":true}"#).unwrap();
        assert_eq!(msg, ControlMessage::Record { recording: true });
    }

    #[test]
    fn test_parse_load_ignores_source_tag() {
        let msg = ControlMessage::from_json(
            r#"{"source":"ar","action":"load","clipId":"A","token":"t1","buffer":[[0.0,0.5],[1.0,1.5]]}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ControlMessage::Load {
                clip_id: "A".to_string(),
                token: "t1".to_string(),
                buffer: vec![vec![0.0, 0.5], vec![1.0, 1.5]],
            }
        );
    }

    #[test]
    fn test_parse_loop() {
        let msg = ControlMessage::from_value(json!({
            "action": "loop",
            "clipId": "A",
            "token": "t1",
            "loop": {"enabled": true, "startBar": 2, "loopLength": 4}
        }))
        .unwrap();
        let ControlMessage::Loop { loop_config, .. } = msg else {
            panic!("expected loop message, got {msg:?}");
        };
        assert!(loop_config.enabled);
        assert_eq!(loop_config.start_bar, 2.0);
        assert_eq!(loop_config.loop_length, 4.0);
    }

    #[test]
    fn test_unknown_action_rejected() {
        let err = ControlMessage::from_json(r#"{"action":"function","code":"x"}"#).unwrap_err();
        assert!(matches!(err, MessageError::UnknownAction(a) if a == "function"));
    }

    #[test]
    fn test_missing_action_rejected() {
        let err = ControlMessage::from_json(r#"{"clipId":"A"}"#).unwrap_err();
        assert!(matches!(err, MessageError::MissingAction));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let err = ControlMessage::from_json(r#"{"action":"delete","clipId":"A"}"#).unwrap_err();
        assert!(matches!(err, MessageError::Malformed(_)));
    }

    #[test]
    fn test_message_round_trips_through_json() {
        let msg = ControlMessage::Play {
            clip_id: "B".to_string(),
        };
        let json = msg.to_json().unwrap();
        assert_eq!(json, r#"{"action":"play","clipId":"B"}"#);
        assert_eq!(ControlMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_finalize_event_shape() {
        let event = EngineEvent::Finalize {
            clip_id: "A".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"action": "finalize", "clipId": "A"})
        );
    }

    #[test]
    fn test_error_event_shape() {
        let event = EngineEvent::Error {
            error: "no clip selected".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"action": "error", "error": "no clip selected"})
        );
    }

    #[test]
    fn test_buffer_event_shape() {
        let event = EngineEvent::Buffer(BufferChunk {
            start_sample: 0,
            end_sample: 2,
            channels: vec![vec![0.25, 0.5]],
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"buffer": {"startSample": 0, "endSample": 2, "channels": [[0.25, 0.5]]}})
        );
    }

    #[test]
    fn test_transport_event_shape() {
        let transport = TransportSnapshot::playing_at(120.0, 4, 1.0, 0.0);
        let value = serde_json::to_value(EngineEvent::Transport(transport)).unwrap();
        assert_eq!(value["event"], "transport");
        assert_eq!(value["transport"]["timeSigNumerator"], 4);

        let back: EngineEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, EngineEvent::Transport(transport));
    }
}
