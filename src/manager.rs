use std::sync::Arc;

use crate::events::{EventBus, EventKind, PipelineEvent};
use crate::monitor;
use crate::state::UiState;

/// Bridges bus events into the read-only state projection. Counters are
/// recorded by the scheduler itself (so they happen-before the events that
/// report them); this bridge maintains everything presentational: the active
/// job list, queue preview, discovery stats, flags and the action banner.
pub struct UiManager;

impl UiManager {
    pub fn attach(bus: &EventBus, state: Arc<UiState>) {
        {
            let state = state.clone();
            bus.subscribe(EventKind::DiscoveryFinished, move |event| {
                if let PipelineEvent::DiscoveryFinished { stats } = event {
                    state.set_discovery(*stats);
                }
            });
        }
        {
            let state = state.clone();
            bus.subscribe(EventKind::JobStarted, move |event| {
                if let PipelineEvent::JobStarted { job } = event {
                    state.add_active(job.clone());
                    state.set_usage(monitor::sample_usage());
                }
            });
        }
        {
            let state = state.clone();
            bus.subscribe(EventKind::JobProgressUpdated, move |event| {
                if let PipelineEvent::JobProgressUpdated { job, percent } = event {
                    state.update_active_progress(&job.source.path, *percent);
                }
            });
        }
        {
            let state = state.clone();
            bus.subscribe_many(
                &[EventKind::JobCompleted, EventKind::JobFailed],
                move |event| {
                    let job = match event {
                        PipelineEvent::JobCompleted { job, .. } => job,
                        PipelineEvent::JobFailed { job, .. } => job,
                        _ => return,
                    };
                    state.remove_active(&job.source.path);
                },
            );
        }
        {
            let state = state.clone();
            bus.subscribe(EventKind::QueueUpdated, move |event| {
                if let PipelineEvent::QueueUpdated { pending, total } = event {
                    state.set_queue_preview(pending.clone(), *total);
                }
            });
        }
        {
            let state = state.clone();
            bus.subscribe(EventKind::ThreadCountChanged, move |event| {
                if let PipelineEvent::ThreadCountChanged { current } = event {
                    state.set_threads(*current);
                }
            });
        }
        {
            let state = state.clone();
            bus.subscribe(EventKind::RequestShutdown, move |_| {
                state.set_shutdown_requested();
            });
        }
        {
            let state = state.clone();
            bus.subscribe(EventKind::InterruptRequested, move |_| {
                state.set_interrupt_requested();
            });
        }
        bus.subscribe(EventKind::ActionMessage, move |event| {
            if let PipelineEvent::ActionMessage { text } = event {
                state.set_action(text.clone());
            }
        });
    }
}
