use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::domain::{CompressionJob, DiscoveryStats, VideoFile};
use crate::monitor::SystemUsage;

/// How many finalized jobs the completion ring remembers.
const RECENT_CAPACITY: usize = 5;

/// How long a "last action" message stays visible in snapshots.
const ACTION_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct StateInner {
    completed: u64,
    failed: u64,
    skipped: u64,
    hw_cap: u64,
    camera_skipped: u64,
    av1_skipped: u64,
    interrupted: u64,
    ratio_kept: u64,
    total_input_bytes: u64,
    total_output_bytes: u64,
    active_jobs: Vec<CompressionJob>,
    recent_jobs: VecDeque<CompressionJob>,
    pending_preview: Vec<VideoFile>,
    pending_total: usize,
    discovery: DiscoveryStats,
    discovery_finished: bool,
    current_threads: usize,
    shutdown_requested: bool,
    interrupt_requested: bool,
    last_action: Option<(String, Instant)>,
    usage: Option<SystemUsage>,
}

/// Read-only copy handed to observers; never aliases live pipeline state.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub hw_cap: u64,
    pub camera_skipped: u64,
    pub av1_skipped: u64,
    pub interrupted: u64,
    pub ratio_kept: u64,
    pub total_input_bytes: u64,
    pub total_output_bytes: u64,
    pub active_jobs: Vec<CompressionJob>,
    pub recent_jobs: Vec<CompressionJob>,
    pub pending_preview: Vec<VideoFile>,
    pub pending_total: usize,
    pub discovery: DiscoveryStats,
    pub discovery_finished: bool,
    pub current_threads: usize,
    pub shutdown_requested: bool,
    pub interrupt_requested: bool,
    pub last_action: Option<String>,
    pub usage: Option<SystemUsage>,
    pub started_at: DateTime<Local>,
    pub elapsed_seconds: f64,
    // Derived views over the counters and the wall clock.
    pub space_saved_bytes: u64,
    pub compression_ratio: f64,
    pub throughput_bytes_per_sec: f64,
    pub eta_seconds: Option<f64>,
}

/// Thread-safe projection of the run, consumed by the dashboard and the
/// summary printer. Counters only ever increase; derived figures are computed
/// at snapshot time.
#[derive(Debug)]
pub struct UiState {
    inner: Mutex<StateInner>,
    started_at: DateTime<Local>,
    started_instant: Instant,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

impl UiState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StateInner::default()),
            started_at: Local::now(),
            started_instant: Instant::now(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StateInner> {
        self.inner.lock().expect("ui state poisoned")
    }

    pub fn add_completed(&self, job: &CompressionJob, input_bytes: u64, output_bytes: u64) {
        let mut inner = self.lock();
        inner.completed += 1;
        inner.total_input_bytes += input_bytes;
        inner.total_output_bytes += output_bytes;
        if job.kept_original {
            inner.ratio_kept += 1;
        }
        push_recent(&mut inner, job);
    }

    pub fn add_failed(&self, job: &CompressionJob) {
        let mut inner = self.lock();
        inner.failed += 1;
        push_recent(&mut inner, job);
    }

    pub fn add_hw_cap(&self, job: &CompressionJob) {
        let mut inner = self.lock();
        inner.hw_cap += 1;
        push_recent(&mut inner, job);
    }

    pub fn add_interrupted(&self, job: &CompressionJob) {
        let mut inner = self.lock();
        inner.interrupted += 1;
        push_recent(&mut inner, job);
    }

    pub fn add_skipped(&self) {
        self.lock().skipped += 1;
    }

    pub fn add_camera_skipped(&self) {
        self.lock().camera_skipped += 1;
    }

    pub fn add_av1_skipped(&self) {
        self.lock().av1_skipped += 1;
    }

    pub fn add_active(&self, job: CompressionJob) {
        let mut inner = self.lock();
        if !inner
            .active_jobs
            .iter()
            .any(|j| j.source.path == job.source.path)
        {
            inner.active_jobs.push(job);
        }
    }

    pub fn update_active_progress(&self, path: &Path, percent: f64) {
        let mut inner = self.lock();
        if let Some(job) = inner
            .active_jobs
            .iter_mut()
            .find(|j| j.source.path == path)
        {
            job.progress = percent;
        }
    }

    pub fn remove_active(&self, path: &Path) {
        let mut inner = self.lock();
        inner.active_jobs.retain(|j| j.source.path != path);
    }

    pub fn set_queue_preview(&self, preview: Vec<VideoFile>, total: usize) {
        let mut inner = self.lock();
        inner.pending_preview = preview;
        inner.pending_total = total;
    }

    pub fn set_discovery(&self, stats: DiscoveryStats) {
        let mut inner = self.lock();
        inner.discovery = stats;
        inner.discovery_finished = true;
    }

    pub fn set_threads(&self, current: usize) {
        self.lock().current_threads = current;
    }

    pub fn set_shutdown_requested(&self) {
        self.lock().shutdown_requested = true;
    }

    pub fn set_interrupt_requested(&self) {
        self.lock().interrupt_requested = true;
    }

    pub fn set_action(&self, text: String) {
        self.lock().last_action = Some((text, Instant::now()));
    }

    pub fn set_usage(&self, usage: SystemUsage) {
        self.lock().usage = Some(usage);
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.lock();
        let elapsed = self.started_instant.elapsed().as_secs_f64();
        let throughput = if elapsed > 0.0 {
            inner.total_input_bytes as f64 / elapsed
        } else {
            0.0
        };
        let finalized = inner.completed
            + inner.failed
            + inner.hw_cap
            + inner.interrupted
            + inner.skipped
            + inner.camera_skipped
            + inner.av1_skipped;
        let eta_seconds = if inner.pending_total > 0 && finalized > 0 {
            Some(inner.pending_total as f64 * elapsed / finalized as f64)
        } else {
            None
        };
        let compression_ratio = if inner.total_input_bytes > 0 {
            inner.total_output_bytes as f64 / inner.total_input_bytes as f64
        } else {
            0.0
        };

        StateSnapshot {
            completed: inner.completed,
            failed: inner.failed,
            skipped: inner.skipped,
            hw_cap: inner.hw_cap,
            camera_skipped: inner.camera_skipped,
            av1_skipped: inner.av1_skipped,
            interrupted: inner.interrupted,
            ratio_kept: inner.ratio_kept,
            total_input_bytes: inner.total_input_bytes,
            total_output_bytes: inner.total_output_bytes,
            active_jobs: inner.active_jobs.clone(),
            recent_jobs: inner.recent_jobs.iter().cloned().collect(),
            pending_preview: inner.pending_preview.clone(),
            pending_total: inner.pending_total,
            discovery: inner.discovery,
            discovery_finished: inner.discovery_finished,
            current_threads: inner.current_threads,
            shutdown_requested: inner.shutdown_requested,
            interrupt_requested: inner.interrupt_requested,
            last_action: inner
                .last_action
                .as_ref()
                .filter(|(_, at)| at.elapsed() < ACTION_TTL)
                .map(|(text, _)| text.clone()),
            usage: inner.usage.clone(),
            started_at: self.started_at,
            elapsed_seconds: elapsed,
            space_saved_bytes: inner
                .total_input_bytes
                .saturating_sub(inner.total_output_bytes),
            compression_ratio,
            throughput_bytes_per_sec: throughput,
            eta_seconds,
        }
    }
}

fn push_recent(inner: &mut StateInner, job: &CompressionJob) {
    if inner.recent_jobs.len() == RECENT_CAPACITY {
        inner.recent_jobs.pop_back();
    }
    inner.recent_jobs.push_front(job.clone());
}
