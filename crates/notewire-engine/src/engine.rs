// Engine: log append plus fan-out to per-processor queues

use std::sync::{Arc, Weak};

use notewire_core::{EngineError, Event, EventLog, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::processor::Processor;

struct Route {
    processor: Arc<dyn Processor>,
    sender: mpsc::UnboundedSender<Event>,
}

struct EngineInner {
    log: Arc<dyn EventLog>,
    routes: Vec<Route>,
}

impl EngineInner {
    async fn emit(&self, event: Event) -> Result<i64> {
        let sequence = self.log.append(&event).await?;
        for route in &self.routes {
            if !route.processor.applies_to(&event) {
                continue;
            }
            if route.sender.send(event.clone()).is_err() {
                warn!(
                    processor = route.processor.name(),
                    event = event.name(),
                    "consumer queue closed, event not enqueued"
                );
            }
        }
        debug!(event = event.name(), event_id = %event.id, sequence, "event emitted");
        Ok(sequence)
    }
}

/// Owns the event log and one consumer task per registered processor.
///
/// `emit` appends the event to the log and enqueues a copy for every
/// processor whose `applies_to` accepts it, then returns. Each consumer
/// works through its queue sequentially, so a single processor sees events
/// in emit order while processors never block each other. Dropping the
/// engine closes the queues and the consumers stop once drained.
pub struct Engine {
    inner: Arc<EngineInner>,
    tasks: Vec<JoinHandle<()>>,
}

/// Cloneable handle for emitting events into the pipeline.
///
/// Holds a weak reference so handles retained by processors or consumer
/// tasks do not keep the queues alive past shutdown.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Weak<EngineInner>,
}

impl EngineHandle {
    /// Emit an event. Fails with [`EngineError::Stopped`] once the engine
    /// has shut down.
    pub async fn emit(&self, event: Event) -> Result<i64> {
        let Some(inner) = self.inner.upgrade() else {
            return Err(EngineError::Stopped);
        };
        inner.emit(event).await
    }
}

impl Engine {
    pub fn new(log: Arc<dyn EventLog>, processors: Vec<Arc<dyn Processor>>) -> Self {
        let mut routes = Vec::with_capacity(processors.len());
        let mut consumers = Vec::with_capacity(processors.len());
        for processor in processors {
            let (sender, receiver) = mpsc::unbounded_channel();
            routes.push(Route {
                processor: processor.clone(),
                sender,
            });
            consumers.push((processor, receiver));
        }

        let inner = Arc::new(EngineInner { log, routes });
        let handle = EngineHandle {
            inner: Arc::downgrade(&inner),
        };
        let tasks = consumers
            .into_iter()
            .map(|(processor, receiver)| tokio::spawn(consume(processor, receiver, handle.clone())))
            .collect();

        Self { inner, tasks }
    }

    /// Handle for emitting from outside the engine (API handlers, tests).
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Append the event to the log and enqueue it for matching processors.
    ///
    /// Returns the per-team sequence assigned by the log. Processing runs
    /// on the consumer tasks; this call never waits for it.
    pub async fn emit(&self, event: Event) -> Result<i64> {
        self.inner.emit(event).await
    }

    /// Close the queues, let consumers drain what is already buffered, and
    /// wait for them to finish.
    pub async fn shutdown(self) {
        let Engine { inner, tasks } = self;
        drop(inner);
        for task in tasks {
            if let Err(err) = task.await {
                error!(error = %err, "consumer task panicked");
            }
        }
        info!("engine stopped");
    }
}

async fn consume(
    processor: Arc<dyn Processor>,
    mut receiver: mpsc::UnboundedReceiver<Event>,
    handle: EngineHandle,
) {
    while let Some(event) = receiver.recv().await {
        if let Err(err) = processor.process(&event, &handle).await {
            error!(
                processor = processor.name(),
                event = event.name(),
                event_id = %event.id,
                error = %err,
                "processor failed, event skipped"
            );
        }
    }
    info!(processor = processor.name(), "consumer stopped");
}
