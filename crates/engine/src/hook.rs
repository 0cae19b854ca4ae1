//! Per-block extension point with failure containment.
//!
//! A hook that returns an error or panics is switched off for good and the
//! failure is reported as an [`EngineError`]; the block itself always completes.

use std::panic::{AssertUnwindSafe, catch_unwind};

use looper_transport::TransportSnapshot;

use crate::error::EngineError;

/// Read-only view of the block a hook is called for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HookContext {
    pub now: f64,
    pub beat_position: f64,
    /// Position at the start of this block.
    pub samples_elapsed: u64,
    pub frames: usize,
    pub sample_rate: u32,
    pub transport: TransportSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub &'static str);

/// User logic run once per playing block, inside the render context.
pub trait BlockHook: Send {
    fn name(&self) -> &'static str;

    fn on_block(&mut self, context: &HookContext) -> Result<(), HookError>;
}

pub(crate) struct HookSlot {
    hook: Box<dyn BlockHook>,
    enabled: bool,
}

impl HookSlot {
    pub(crate) fn new(hook: Box<dyn BlockHook>) -> Self {
        Self {
            hook,
            enabled: true,
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn run(&mut self, context: &HookContext) -> Option<EngineError> {
        if !self.enabled {
            return None;
        }
        let hook = &mut self.hook;
        let outcome = catch_unwind(AssertUnwindSafe(|| hook.on_block(context)));
        let failure = match outcome {
            Ok(Ok(())) => return None,
            Ok(Err(HookError(reason))) => EngineError::HookFailed {
                hook: self.hook.name(),
                reason,
            },
            Err(_) => EngineError::HookPanicked {
                hook: self.hook.name(),
            },
        };
        self.enabled = false;
        Some(failure)
    }
}
