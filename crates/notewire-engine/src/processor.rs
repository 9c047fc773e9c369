// Processor seam for the event pipeline

use async_trait::async_trait;
use notewire_core::{Event, Result};

use crate::engine::EngineHandle;

/// A pipeline stage fed from its own queue by a dedicated consumer task.
///
/// Processors see events strictly in the order they were emitted. A failed
/// `process` call is logged by the consumer and the event is skipped; the
/// consumer itself keeps running.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Stable name used in log output.
    fn name(&self) -> &'static str;

    /// Whether this processor wants the event enqueued at all.
    fn applies_to(&self, event: &Event) -> bool;

    /// Handle one event. The handle allows emitting follow-on events back
    /// into the pipeline.
    async fn process(&self, event: &Event, handle: &EngineHandle) -> Result<()>;
}
