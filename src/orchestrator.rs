use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use regex::{Regex, RegexBuilder};
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, GeneralConfig, MAX_THREADS};
use crate::domain::{
    CancelFlag, CompressionJob, JobOutcome, JobStatus, SkipKind, VideoFile, output_path_for,
};
use crate::encoder::Encoder;
use crate::events::{EventBus, EventKind, PipelineEvent};
use crate::markers::MarkerStore;
use crate::probe::MetadataCache;
use crate::scanner::FileScanner;
use crate::state::UiState;

/// Fixed worker-pool ceiling. The admission cap gates how many of these
/// slots may encode at once; the pool itself is never resized.
const POOL_SIZE: usize = MAX_THREADS;

/// The scheduler's completion wait: short enough to react to cap
/// adjustments and interrupts without a finalization.
const COMPLETION_WAIT: Duration = Duration::from_secs(1);

/// After a hard interrupt, in-flight supervisors get this long to observe
/// the cancel signal before the pool is abandoned.
const HARD_INTERRUPT_DEADLINE: Duration = Duration::from_secs(10);

/// How many queue-head entries get metadata preloaded for the preview.
const QUEUE_PREVIEW: usize = 5;

static SIGINT_SEEN: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_sigint(_signal: libc::c_int) {
    SIGINT_SEEN.store(true, Ordering::SeqCst);
}

/// Routes the process interrupt signal into the scheduler's poll loop.
#[cfg(unix)]
pub fn install_interrupt_handler() {
    unsafe {
        libc::signal(libc::SIGINT, on_sigint as usize);
    }
}

#[cfg(not(unix))]
pub fn install_interrupt_handler() {}

pub fn interrupt_pending() -> bool {
    SIGINT_SEEN.load(Ordering::SeqCst)
}

#[derive(Debug)]
struct ControllerInner {
    max_threads: usize,
    active: usize,
    shutdown: bool,
}

/// Admission gate for the worker pool: an integer cap in `[1, 16]` behind a
/// condition variable. Decreasing the cap never cancels admitted work; it
/// only stops further admissions until finalizations catch up.
#[derive(Debug)]
pub struct ThreadController {
    inner: Mutex<ControllerInner>,
    cv: Condvar,
}

impl ThreadController {
    pub fn new(initial: usize) -> Self {
        Self {
            inner: Mutex::new(ControllerInner {
                max_threads: initial.clamp(1, MAX_THREADS),
                active: 0,
                shutdown: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Blocks until a slot is free. Returns false when shutdown was
    /// requested, in which case no slot is held.
    pub fn acquire(&self) -> bool {
        let mut inner = self.inner.lock().expect("thread controller poisoned");
        loop {
            if inner.shutdown {
                return false;
            }
            if inner.active < inner.max_threads {
                inner.active += 1;
                return true;
            }
            inner = self.cv.wait(inner).expect("thread controller poisoned");
        }
    }

    pub fn release(&self) {
        let mut inner = self.inner.lock().expect("thread controller poisoned");
        inner.active = inner.active.saturating_sub(1);
        self.cv.notify_one();
    }

    /// Applies a cap delta, clamped into `[1, 16]`. Returns (old, new).
    /// An increase wakes admission waiters; a decrease wakes nobody.
    pub fn adjust(&self, change: i32) -> (usize, usize) {
        let mut inner = self.inner.lock().expect("thread controller poisoned");
        let old = inner.max_threads;
        let new = (old as i64 + change as i64).clamp(1, MAX_THREADS as i64) as usize;
        inner.max_threads = new;
        if new > old {
            self.cv.notify_all();
        }
        (old, new)
    }

    /// Stops all future admissions; waiters in `acquire` return false.
    pub fn graceful_shutdown(&self) {
        let mut inner = self.inner.lock().expect("thread controller poisoned");
        inner.shutdown = true;
        self.cv.notify_all();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.inner
            .lock()
            .expect("thread controller poisoned")
            .shutdown
    }

    pub fn current(&self) -> usize {
        self.inner
            .lock()
            .expect("thread controller poisoned")
            .max_threads
    }

    pub fn active(&self) -> usize {
        self.inner.lock().expect("thread controller poisoned").active
    }
}

struct SlotGuard<'a>(&'a ThreadController);

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub interrupted: bool,
}

/// Everything a worker needs to take one file from dequeue to outcome.
struct WorkerContext {
    general: GeneralConfig,
    autorotate: Vec<(Regex, u32)>,
    bus: Arc<EventBus>,
    markers: Arc<MarkerStore>,
    cache: Arc<MetadataCache>,
    encoder: Arc<dyn Encoder>,
    controller: Arc<ThreadController>,
    cancel: Arc<CancelFlag>,
    input_root: PathBuf,
    output_root: PathBuf,
}

/// The pipeline scheduler: owns the pending deque and the in-flight set,
/// submits on demand against the admission cap, merges refreshes without
/// duplication, routes outcomes into markers/counters/events, and
/// distinguishes graceful shutdown from hard interrupt.
pub struct Orchestrator {
    config: AppConfig,
    bus: Arc<EventBus>,
    scanner: FileScanner,
    markers: Arc<MarkerStore>,
    cache: Arc<MetadataCache>,
    encoder: Arc<dyn Encoder>,
    state: Arc<UiState>,
    controller: Arc<ThreadController>,
    cancel: Arc<CancelFlag>,
    refresh_requested: Arc<AtomicBool>,
    interrupt_requested: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        bus: Arc<EventBus>,
        scanner: FileScanner,
        markers: Arc<MarkerStore>,
        cache: Arc<MetadataCache>,
        encoder: Arc<dyn Encoder>,
        state: Arc<UiState>,
    ) -> Self {
        let controller = Arc::new(ThreadController::new(config.general.threads));
        let orchestrator = Self {
            config,
            bus,
            scanner,
            markers,
            cache,
            encoder,
            state,
            controller,
            cancel: Arc::new(CancelFlag::new()),
            refresh_requested: Arc::new(AtomicBool::new(false)),
            interrupt_requested: Arc::new(AtomicBool::new(false)),
        };
        orchestrator.setup_subscriptions();
        orchestrator
    }

    pub fn controller(&self) -> Arc<ThreadController> {
        self.controller.clone()
    }

    pub fn cancel_flag(&self) -> Arc<CancelFlag> {
        self.cancel.clone()
    }

    fn setup_subscriptions(&self) {
        {
            let controller = self.controller.clone();
            let bus = self.bus.clone();
            self.bus.subscribe(EventKind::RequestShutdown, move |_| {
                controller.graceful_shutdown();
                bus.publish(&PipelineEvent::ActionMessage {
                    text: "SHUTDOWN requested".to_string(),
                });
            });
        }
        {
            let controller = self.controller.clone();
            let bus = self.bus.clone();
            self.bus.subscribe(EventKind::ThreadControlEvent, move |event| {
                let PipelineEvent::ThreadControlEvent { change } = event else {
                    return;
                };
                let (old, new) = controller.adjust(*change);
                if old != new {
                    bus.publish(&PipelineEvent::ActionMessage {
                        text: format!("Threads: {old} -> {new}"),
                    });
                    bus.publish(&PipelineEvent::ThreadCountChanged { current: new });
                }
            });
        }
        {
            let refresh = self.refresh_requested.clone();
            self.bus.subscribe(EventKind::RefreshRequested, move |_| {
                refresh.store(true, Ordering::SeqCst);
            });
        }
        {
            let interrupt = self.interrupt_requested.clone();
            self.bus.subscribe(EventKind::InterruptRequested, move |_| {
                interrupt.store(true, Ordering::SeqCst);
            });
        }
    }

    pub fn run(&self, input_dir: &Path) -> Result<RunOutcome> {
        let output_root = self.markers.output_root().to_path_buf();

        self.bus.publish(&PipelineEvent::DiscoveryStarted {
            directory: input_dir.to_path_buf(),
        });
        let discovery = self.scanner.discover(
            input_dir,
            &output_root,
            &self.markers,
            self.config.general.clean_errors,
        )?;
        self.bus.publish(&PipelineEvent::DiscoveryFinished {
            stats: discovery.stats,
        });
        self.bus.publish(&PipelineEvent::ThreadCountChanged {
            current: self.controller.current(),
        });

        if discovery.ready.is_empty() {
            info!("no files to process");
            return Ok(RunOutcome { interrupted: false });
        }

        let mut pending: VecDeque<VideoFile> = discovery.ready.into();
        let mut in_flight: HashSet<PathBuf> = HashSet::new();
        let mut finished: HashSet<PathBuf> = HashSet::new();

        let (job_tx, job_rx) = unbounded::<VideoFile>();
        let (outcome_tx, outcome_rx) = unbounded::<JobOutcome>();

        let ctx = Arc::new(WorkerContext {
            general: self.config.general.clone(),
            autorotate: compile_autorotate(&self.config),
            bus: self.bus.clone(),
            markers: self.markers.clone(),
            cache: self.cache.clone(),
            encoder: self.encoder.clone(),
            controller: self.controller.clone(),
            cancel: self.cancel.clone(),
            input_root: input_dir.to_path_buf(),
            output_root,
        });

        // The pool is always full-size: a refresh or a cap increase may call
        // for more concurrency than the initial ready count; idle workers
        // just park on the feed.
        let workers = spawn_workers(POOL_SIZE, ctx, job_rx, outcome_tx);

        self.preload_and_publish_queue(&mut pending);
        self.submit_batch(&mut pending, &mut in_flight, &job_tx);

        let mut interrupted = false;
        loop {
            if in_flight.is_empty()
                && (pending.is_empty() || self.controller.is_shutdown_requested())
            {
                break;
            }

            match outcome_rx.recv_timeout(COMPLETION_WAIT) {
                Ok(outcome) => self.route_outcome(outcome, &mut in_flight, &mut finished),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            let signalled = interrupt_pending();
            if signalled || self.interrupt_requested.load(Ordering::SeqCst) {
                interrupted = true;
                self.handle_hard_interrupt(
                    signalled,
                    &mut pending,
                    &mut in_flight,
                    &mut finished,
                    &outcome_rx,
                );
                break;
            }

            if self.refresh_requested.swap(false, Ordering::SeqCst) {
                self.handle_refresh(input_dir, &mut pending, &in_flight, &finished)?;
            }

            self.submit_batch(&mut pending, &mut in_flight, &job_tx);
        }

        drop(job_tx);
        if interrupted {
            // Workers may still be tearing their children down past the
            // drain deadline; they are left to finish on their own while the
            // process exits with the interrupt code.
            info!("hard interrupt: abandoning worker pool after drain");
        } else {
            for handle in workers {
                let _ = handle.join();
            }
            info!("all files processed");
        }
        Ok(RunOutcome { interrupted })
    }

    /// Keeps `|in_flight| <= prefetch_factor * cap`, feeding from the front
    /// of the pending deque, then refreshes the queue preview.
    fn submit_batch(
        &self,
        pending: &mut VecDeque<VideoFile>,
        in_flight: &mut HashSet<PathBuf>,
        job_tx: &Sender<VideoFile>,
    ) {
        let limit = self.config.general.prefetch_factor * self.controller.current();
        while in_flight.len() < limit
            && !pending.is_empty()
            && !self.controller.is_shutdown_requested()
        {
            let file = pending.pop_front().expect("pending non-empty");
            in_flight.insert(file.path.clone());
            if job_tx.send(file).is_err() {
                break;
            }
        }
        self.preload_and_publish_queue(pending);
    }

    fn preload_and_publish_queue(&self, pending: &mut VecDeque<VideoFile>) {
        for file in pending.iter_mut().take(QUEUE_PREVIEW) {
            if file.metadata.is_none() {
                let metadata = self.cache.get(file);
                file.metadata = metadata;
            }
        }
        let preview: Vec<VideoFile> = pending.iter().take(QUEUE_PREVIEW).cloned().collect();
        self.bus.publish(&PipelineEvent::QueueUpdated {
            pending: preview,
            total: pending.len(),
        });
    }

    fn ensure_err_marker(&self, job: &CompressionJob) {
        let err_path = MarkerStore::err_path(&job.output_path);
        if !err_path.exists() {
            let message = job.error_message.as_deref().unwrap_or("Unknown error");
            if let Err(err) = self.markers.record_failure(&job.output_path, message) {
                warn!(output = %job.output_path.display(), error = %err, "failed to write error marker");
            }
        }
    }

    /// Counter updates happen here, before the terminal event is published,
    /// so subscribers always observe a consistent projection.
    fn route_outcome(
        &self,
        outcome: JobOutcome,
        in_flight: &mut HashSet<PathBuf>,
        finished: &mut HashSet<PathBuf>,
    ) {
        let path = outcome.job.source.path.clone();
        in_flight.remove(&path);
        finished.insert(path.clone());
        self.cache.invalidate(&path);

        let mut job = outcome.job;
        let message = job
            .error_message
            .clone()
            .unwrap_or_else(|| "Unknown error".to_string());

        if let Some(kind) = outcome.skip {
            match kind {
                // Never admitted: not part of this run's accounting.
                SkipKind::Shutdown => {
                    debug!(file = %job.source.file_name(), "PROCESS_SKIP: shutdown");
                    return;
                }
                SkipKind::Av1 => self.state.add_av1_skipped(),
                SkipKind::Camera => self.state.add_camera_skipped(),
                SkipKind::Deleted
                | SkipKind::Collision
                | SkipKind::ErrMarker
                | SkipKind::Claimed => self.state.add_skipped(),
            }
            self.bus.publish(&PipelineEvent::JobFailed { job, message });
            return;
        }

        match job.status {
            JobStatus::Completed => {
                let output_size = outcome.output_size.unwrap_or(0);
                self.state
                    .add_completed(&job, outcome.input_size, output_size);
                self.bus
                    .publish(&PipelineEvent::JobCompleted { job, output_size });
            }
            JobStatus::HwCapLimit => {
                self.ensure_err_marker(&job);
                self.state.add_hw_cap(&job);
                self.bus.publish(&PipelineEvent::JobFailed { job, message });
            }
            JobStatus::Interrupted => {
                self.state.add_interrupted(&job);
                self.bus.publish(&PipelineEvent::JobFailed { job, message });
            }
            JobStatus::Skipped => {
                self.state.add_skipped();
                self.bus.publish(&PipelineEvent::JobFailed { job, message });
            }
            JobStatus::Failed => {
                self.ensure_err_marker(&job);
                self.state.add_failed(&job);
                self.bus.publish(&PipelineEvent::JobFailed { job, message });
            }
            JobStatus::Pending | JobStatus::Processing => {
                // Supervisor returned without reaching a terminal state.
                job.status = JobStatus::Failed;
                job.error_message =
                    Some("Compression finished but status not updated".to_string());
                self.ensure_err_marker(&job);
                self.state.add_failed(&job);
                let message = job.error_message.clone().unwrap_or_default();
                self.bus.publish(&PipelineEvent::JobFailed { job, message });
            }
        }
    }

    /// Re-runs discovery and merges: appends ready files the queue does not
    /// already know, drops pending entries that vanished or became
    /// error-marked, and reports the delta.
    fn handle_refresh(
        &self,
        input_dir: &Path,
        pending: &mut VecDeque<VideoFile>,
        in_flight: &HashSet<PathBuf>,
        finished: &HashSet<PathBuf>,
    ) -> Result<()> {
        info!("refresh requested, re-running discovery");
        let discovery = self.scanner.discover(
            input_dir,
            self.markers.output_root(),
            &self.markers,
            self.config.general.clean_errors,
        )?;

        let new_ready: HashSet<PathBuf> =
            discovery.ready.iter().map(|f| f.path.clone()).collect();
        let before = pending.len();
        pending.retain(|f| new_ready.contains(&f.path));
        let removed = before - pending.len();

        let pending_paths: HashSet<PathBuf> = pending.iter().map(|f| f.path.clone()).collect();
        let mut added = 0usize;
        for file in discovery.ready {
            if pending_paths.contains(&file.path)
                || in_flight.contains(&file.path)
                || finished.contains(&file.path)
            {
                continue;
            }
            pending.push_back(file);
            added += 1;
        }

        self.bus.publish(&PipelineEvent::DiscoveryFinished {
            stats: discovery.stats,
        });
        let text = if added == 0 && removed == 0 {
            "Refreshed: no changes".to_string()
        } else {
            format!("Refreshed: +{added} new, -{removed} deleted")
        };
        info!(added, removed, "refresh merged into pending queue");
        self.bus.publish(&PipelineEvent::ActionMessage { text });
        Ok(())
    }

    /// Hard interrupt: cancel every in-flight supervisor, drop the pending
    /// queue, and drain finalizations for a bounded deadline.
    fn handle_hard_interrupt(
        &self,
        from_signal: bool,
        pending: &mut VecDeque<VideoFile>,
        in_flight: &mut HashSet<PathBuf>,
        finished: &mut HashSet<PathBuf>,
        outcome_rx: &Receiver<JobOutcome>,
    ) {
        warn!("interrupt requested, cancelling active compressions");
        if from_signal {
            self.bus.publish(&PipelineEvent::InterruptRequested);
        }
        self.bus.publish(&PipelineEvent::ActionMessage {
            text: "Interrupting active compressions...".to_string(),
        });

        self.cancel.cancel();
        self.controller.graceful_shutdown();
        pending.clear();
        self.preload_and_publish_queue(pending);

        let deadline = Instant::now() + HARD_INTERRUPT_DEADLINE;
        while !in_flight.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(
                    still_in_flight = in_flight.len(),
                    "interrupt drain deadline reached, forcing pool shutdown"
                );
                break;
            }
            match outcome_rx.recv_timeout(remaining.min(Duration::from_millis(200))) {
                Ok(outcome) => self.route_outcome(outcome, in_flight, finished),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("interrupt drain finished");
    }
}

fn compile_autorotate(config: &AppConfig) -> Vec<(Regex, u32)> {
    let mut compiled = Vec::new();
    for (pattern, angle) in &config.autorotate.patterns {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => compiled.push((regex, *angle)),
            Err(err) => {
                warn!(pattern = %pattern, error = %err, "invalid autorotate pattern ignored")
            }
        }
    }
    compiled
}

fn rotation_for(autorotate: &[(Regex, u32)], filename: &str) -> Option<u32> {
    for (regex, angle) in autorotate {
        if regex.is_match(filename) {
            if *angle == 0 {
                return None;
            }
            debug!(file = filename, angle, "auto-rotation matched");
            return Some(*angle);
        }
    }
    None
}

fn spawn_workers(
    pool_size: usize,
    ctx: Arc<WorkerContext>,
    job_rx: Receiver<VideoFile>,
    outcome_tx: Sender<JobOutcome>,
) -> Vec<JoinHandle<()>> {
    (0..pool_size)
        .map(|index| {
            let ctx = ctx.clone();
            let job_rx = job_rx.clone();
            let outcome_tx = outcome_tx.clone();
            thread::Builder::new()
                .name(format!("encode-worker-{index}"))
                .spawn(move || {
                    while let Ok(file) = job_rx.recv() {
                        let outcome = process_file(&ctx, file);
                        if outcome_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                })
                .expect("failed to spawn encode worker thread")
        })
        .collect()
}

fn skip_outcome(
    file: VideoFile,
    output_path: PathBuf,
    cq: u32,
    kind: SkipKind,
    message: impl Into<String>,
) -> JobOutcome {
    let input_size = file.size_bytes;
    let mut job = CompressionJob::new(file, output_path, cq, None);
    job.status = JobStatus::Skipped;
    job.error_message = Some(message.into());
    JobOutcome {
        job,
        input_size,
        output_size: None,
        skip: Some(kind),
    }
}

/// One file, dequeue to outcome: pre-execution filters, admission, the
/// supervised encode, and exception containment.
fn process_file(ctx: &WorkerContext, mut file: VideoFile) -> JobOutcome {
    let filename = file.file_name();
    debug!(file = %filename, "PROCESS_START");
    let input_size = file.size_bytes;
    let output_path = output_path_for(&ctx.input_root, &ctx.output_root, &file.path);
    let default_cq = ctx.general.cq;

    if !file.path.exists() {
        return skip_outcome(
            file,
            output_path,
            default_cq,
            SkipKind::Deleted,
            "File was deleted or moved",
        );
    }

    let metadata = ctx.cache.get(&file);
    file.metadata = metadata;
    let Some(metadata) = file.metadata.clone() else {
        // The probe itself failed: the container is unreadable, so there is
        // no point launching an encoder on it.
        let mut job = CompressionJob::new(file, output_path, default_cq, None);
        job.status = JobStatus::Failed;
        job.error_message = Some("File is corrupted (ffprobe failed to read)".to_string());
        if let Some(message) = job.error_message.as_deref() {
            let _ = ctx.markers.record_failure(&job.output_path, message);
        }
        return JobOutcome {
            job,
            input_size,
            output_size: None,
            skip: None,
        };
    };

    if ctx.general.skip_av1 && metadata.codec == "av1" {
        return skip_outcome(
            file,
            output_path,
            default_cq,
            SkipKind::Av1,
            "Already encoded in AV1",
        );
    }

    if !ctx.general.filter_cameras.is_empty() {
        let camera = metadata
            .camera
            .clone()
            .or_else(|| metadata.camera_raw.clone())
            .unwrap_or_default();
        let camera_lower = camera.to_lowercase();
        let matched = ctx
            .general
            .filter_cameras
            .iter()
            .any(|filter| camera_lower.contains(&filter.to_lowercase()));
        if !matched {
            return skip_outcome(
                file,
                output_path,
                default_cq,
                SkipKind::Camera,
                format!("Camera model \"{camera}\" not in filter"),
            );
        }
    }

    if output_path.exists() {
        // Kept grep-able for post-run review.
        warn!(
            input = %file.path.display(),
            output = %output_path.display(),
            "COLLISION: output exists, skipping"
        );
        let message = format!(
            "Output file already exists: {}",
            output_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        return skip_outcome(file, output_path, default_cq, SkipKind::Collision, message);
    }

    if MarkerStore::err_path(&output_path).exists() {
        if ctx.general.clean_errors {
            let _ = ctx.markers.remove_failure_marker(&output_path);
        } else {
            return skip_outcome(
                file,
                output_path,
                default_cq,
                SkipKind::ErrMarker,
                "Existing error marker found",
            );
        }
    }

    let rotation = rotation_for(&ctx.autorotate, &filename);
    let cq = metadata.custom_cq.unwrap_or(default_cq);
    if let (Some(camera), Some(custom)) = (&metadata.camera, metadata.custom_cq) {
        debug!(file = %filename, camera = %camera, cq = custom, "camera quality override");
    }

    if !ctx.controller.acquire() {
        return skip_outcome(
            file,
            output_path,
            cq,
            SkipKind::Shutdown,
            "Shutdown requested",
        );
    }
    let _slot = SlotGuard(&ctx.controller);

    let mut job = CompressionJob::new(file, output_path, cq, rotation);
    job.status = JobStatus::Processing;
    ctx.bus
        .publish(&PipelineEvent::JobStarted { job: job.clone() });

    if let Err(err) = ctx.encoder.compress(&mut job, &ctx.general, &ctx.cancel) {
        error!(file = %filename, error = %format!("{err:#}"), "supervisor raised");
        job.status = JobStatus::Failed;
        job.error_message = Some(format!("Exception: {err:#}"));
        if let Some(message) = job.error_message.as_deref() {
            let _ = ctx.markers.record_failure(&job.output_path, message);
        }
    }

    let output_size = if job.status == JobStatus::Completed {
        fs::metadata(&job.output_path).ok().map(|m| m.len())
    } else {
        None
    };
    debug!(file = %filename, status = ?job.status, "PROCESS_END");
    JobOutcome {
        job,
        input_size,
        output_size,
        skip: None,
    }
}
