pub mod config;
pub mod recorder;
pub mod registry;
pub mod session;

pub use config::{ConfigError, LooperConfig};
pub use recorder::{RecordedTake, TakeAssembler};
pub use registry::{EngineRegistry, InstanceId};
pub use session::{Inbound, Session, SessionError};

pub use looper_engine::{AudioProcessor, EngineConfig, LoopEngine};
pub use looper_transport::{
    BufferChunk, ChannelBuffers, ControlMessage, EngineEvent, LoopConfig, TransportSnapshot,
};
