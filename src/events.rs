use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::domain::{CompressionJob, DiscoveryStats, VideoFile};

/// Everything that flows over the control bus between the pipeline and its
/// external observers (dashboard, keyboard listener).
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    DiscoveryStarted {
        directory: PathBuf,
    },
    DiscoveryFinished {
        stats: DiscoveryStats,
    },
    JobStarted {
        job: CompressionJob,
    },
    JobProgressUpdated {
        job: CompressionJob,
        percent: f64,
    },
    JobCompleted {
        job: CompressionJob,
        output_size: u64,
    },
    JobFailed {
        job: CompressionJob,
        message: String,
    },
    HardwareCapabilityExceeded {
        job: CompressionJob,
    },
    /// Snapshot of the head of the pending queue plus its total length.
    QueueUpdated {
        pending: Vec<VideoFile>,
        total: usize,
    },
    RequestShutdown,
    InterruptRequested,
    ThreadControlEvent {
        change: i32,
    },
    ThreadCountChanged {
        current: usize,
    },
    RefreshRequested,
    ActionMessage {
        text: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DiscoveryStarted,
    DiscoveryFinished,
    JobStarted,
    JobProgressUpdated,
    JobCompleted,
    JobFailed,
    HardwareCapabilityExceeded,
    QueueUpdated,
    RequestShutdown,
    InterruptRequested,
    ThreadControlEvent,
    ThreadCountChanged,
    RefreshRequested,
    ActionMessage,
}

impl PipelineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PipelineEvent::DiscoveryStarted { .. } => EventKind::DiscoveryStarted,
            PipelineEvent::DiscoveryFinished { .. } => EventKind::DiscoveryFinished,
            PipelineEvent::JobStarted { .. } => EventKind::JobStarted,
            PipelineEvent::JobProgressUpdated { .. } => EventKind::JobProgressUpdated,
            PipelineEvent::JobCompleted { .. } => EventKind::JobCompleted,
            PipelineEvent::JobFailed { .. } => EventKind::JobFailed,
            PipelineEvent::HardwareCapabilityExceeded { .. } => {
                EventKind::HardwareCapabilityExceeded
            }
            PipelineEvent::QueueUpdated { .. } => EventKind::QueueUpdated,
            PipelineEvent::RequestShutdown => EventKind::RequestShutdown,
            PipelineEvent::InterruptRequested => EventKind::InterruptRequested,
            PipelineEvent::ThreadControlEvent { .. } => EventKind::ThreadControlEvent,
            PipelineEvent::ThreadCountChanged { .. } => EventKind::ThreadCountChanged,
            PipelineEvent::RefreshRequested => EventKind::RefreshRequested,
            PipelineEvent::ActionMessage { .. } => EventKind::ActionMessage,
        }
    }
}

type Listener = Arc<dyn Fn(&PipelineEvent) + Send + Sync + 'static>;

/// Synchronous typed publish/subscribe bus. Subscribers for an event kind run
/// in registration order on the publisher's thread; there is no queueing.
///
/// The subscriber list is cloned out before invocation, so subscribers may
/// publish further events without deadlocking the bus.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<EventKind, Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        let mut subscribers = self
            .subscribers
            .lock()
            .expect("event bus subscribers poisoned");
        subscribers.entry(kind).or_default().push(Arc::new(listener));
    }

    /// Register one listener for several event kinds at once.
    pub fn subscribe_many<F>(&self, kinds: &[EventKind], listener: F)
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let mut subscribers = self
            .subscribers
            .lock()
            .expect("event bus subscribers poisoned");
        for kind in kinds {
            subscribers.entry(*kind).or_default().push(listener.clone());
        }
    }

    pub fn publish(&self, event: &PipelineEvent) {
        let listeners = {
            let subscribers = self
                .subscribers
                .lock()
                .expect("event bus subscribers poisoned");
            subscribers.get(&event.kind()).cloned().unwrap_or_default()
        };
        for listener in &listeners {
            listener(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(EventKind, usize)> = self
            .subscribers
            .lock()
            .expect("event bus subscribers poisoned")
            .iter()
            .map(|(kind, listeners)| (*kind, listeners.len()))
            .collect();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}
