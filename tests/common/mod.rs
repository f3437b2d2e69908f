#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use tempfile::TempDir;

use vbatch::{
    AppConfig, CancelFlag, CompressionJob, Encoder, EventBus, FileScanner, GeneralConfig,
    HW_CAP_SIGNATURE, JobStatus, MarkerStore, MetadataCache, MetadataSource, Orchestrator,
    UiManager, UiState, VideoFile, VideoMetadata, output_root_for,
};

/// Deterministic metadata source: per-path codec/camera overrides with a
/// plain HEVC default, so scheduler tests never shell out.
#[derive(Default)]
pub struct StubMetadata {
    pub codecs: HashMap<PathBuf, String>,
    pub cameras: HashMap<PathBuf, String>,
}

impl MetadataSource for StubMetadata {
    fn probe(&self, file: &VideoFile) -> Result<VideoMetadata> {
        let camera = self.cameras.get(&file.path).cloned();
        Ok(VideoMetadata {
            width: 1920,
            height: 1080,
            codec: self
                .codecs
                .get(&file.path)
                .cloned()
                .unwrap_or_else(|| "hevc".to_string()),
            fps: Some(30),
            duration_seconds: Some(10.0),
            color_space: None,
            camera: camera.clone(),
            camera_raw: camera,
            custom_cq: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubResult {
    Success,
    Fail,
    HwCap,
}

/// Encoder stand-in with the same on-disk contract as the real supervisor:
/// claims the tmp marker, commits on success, writes `.err` on failure, and
/// observes the cancel flag.
pub struct StubEncoder {
    markers: MarkerStore,
    pub delay: Duration,
    pub wait_for_cancel: bool,
    pub results: Mutex<HashMap<PathBuf, StubResult>>,
    pub launches: Mutex<Vec<PathBuf>>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl StubEncoder {
    pub fn new(markers: MarkerStore) -> Self {
        Self {
            markers,
            delay: Duration::from_millis(20),
            wait_for_cancel: false,
            results: Mutex::new(HashMap::new()),
            launches: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn launches_for(&self, path: &Path) -> usize {
        self.launches
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_path() == path)
            .count()
    }
}

impl Encoder for StubEncoder {
    fn compress(
        &self,
        job: &mut CompressionJob,
        _config: &GeneralConfig,
        cancel: &CancelFlag,
    ) -> Result<()> {
        self.launches.lock().unwrap().push(job.source.path.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let outcome = self
            .results
            .lock()
            .unwrap()
            .get(&job.source.path)
            .copied()
            .unwrap_or(StubResult::Success);

        let claim = self.markers.claim(&job.output_path)?;
        if self.wait_for_cancel {
            let deadline = Instant::now() + Duration::from_secs(8);
            while !cancel.is_cancelled() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
        } else {
            thread::sleep(self.delay);
        }

        if cancel.is_cancelled() {
            drop(claim);
            job.status = JobStatus::Interrupted;
            job.error_message = Some("Interrupted by user".to_string());
        } else {
            match outcome {
                StubResult::Success => {
                    fs::write(claim.path(), b"compressed-bytes")?;
                    claim.commit(&job.output_path)?;
                    job.status = JobStatus::Completed;
                }
                StubResult::Fail => {
                    drop(claim);
                    job.status = JobStatus::Failed;
                    job.error_message = Some("encoder exited with code 1".to_string());
                    self.markers
                        .record_failure(&job.output_path, "encoder exited with code 1")?;
                }
                StubResult::HwCap => {
                    drop(claim);
                    job.status = JobStatus::HwCapLimit;
                    job.error_message = Some(HW_CAP_SIGNATURE.to_string());
                    self.markers
                        .record_failure(&job.output_path, HW_CAP_SIGNATURE)?;
                }
            }
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestPipeline {
    pub dir: TempDir,
    pub input: PathBuf,
    pub output: PathBuf,
    pub bus: Arc<EventBus>,
    pub state: Arc<UiState>,
    pub encoder: Arc<StubEncoder>,
    pub orchestrator: Arc<Orchestrator>,
}

impl TestPipeline {
    pub fn input_file(&self, name: &str) -> PathBuf {
        self.input.join(name)
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output.join(Path::new(name).with_extension("mp4"))
    }

    /// Re-wires a fresh scheduler over the same on-disk tree, as a new
    /// process run would.
    pub fn rewire(
        self,
        metadata_for: impl FnOnce(&Path) -> StubMetadata,
        tune_config: impl FnOnce(&mut AppConfig),
        tune_encoder: impl FnOnce(&mut StubEncoder),
    ) -> TestPipeline {
        let TestPipeline {
            dir, input, output, ..
        } = self;
        wire_pipeline(dir, input, output, metadata_for, tune_config, tune_encoder)
    }
}

pub fn write_input(path: &Path, len: usize) {
    fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
    fs::write(path, vec![0u8; len]).expect("write input");
}

fn wire_pipeline(
    dir: TempDir,
    input: PathBuf,
    output: PathBuf,
    metadata_for: impl FnOnce(&Path) -> StubMetadata,
    tune_config: impl FnOnce(&mut AppConfig),
    tune_encoder: impl FnOnce(&mut StubEncoder),
) -> TestPipeline {
    let mut config = AppConfig::default();
    config.general.threads = 2;
    config.general.min_size_bytes = 1;
    config.general.use_exif = false;
    tune_config(&mut config);

    let markers = Arc::new(MarkerStore::new(output.clone()));
    let bus = Arc::new(EventBus::new());
    let state = Arc::new(UiState::new());
    UiManager::attach(&bus, state.clone());

    let mut stub = StubEncoder::new((*markers).clone());
    tune_encoder(&mut stub);
    let encoder = Arc::new(stub);

    let cache = Arc::new(MetadataCache::new(Arc::new(metadata_for(&input))));
    let scanner = FileScanner::new(config.normalized_extensions(), config.general.min_size_bytes);
    let orchestrator = Arc::new(Orchestrator::new(
        config,
        bus.clone(),
        scanner,
        markers,
        cache,
        encoder.clone(),
        state.clone(),
    ));

    TestPipeline {
        dir,
        input,
        output,
        bus,
        state,
        encoder,
        orchestrator,
    }
}

/// Creates a fresh input tree with `files` (100 bytes each) and wires a full
/// scheduler around the stubs.
pub fn build_pipeline(
    files: &[&str],
    metadata_for: impl FnOnce(&Path) -> StubMetadata,
    tune_config: impl FnOnce(&mut AppConfig),
    tune_encoder: impl FnOnce(&mut StubEncoder),
) -> TestPipeline {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("videos");
    fs::create_dir_all(&input).expect("mkdir input");
    for name in files {
        write_input(&input.join(name), 100);
    }
    let output = output_root_for(&input);
    fs::create_dir_all(&output).expect("mkdir output");

    wire_pipeline(dir, input, output, metadata_for, tune_config, tune_encoder)
}
