use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Terminal and transient states of a single compression attempt.
///
/// `Interrupted` is terminal but never produces an `.err` marker; `HwCapLimit`
/// and `Failed` always do. `Skipped` produces no on-disk trace at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    HwCapLimit,
    Skipped,
    Interrupted,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Processing)
    }
}

/// Technical metadata for one input file, extracted once and cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// Lowercased codec name as reported by the probe ("hevc", "av1", ...).
    pub codec: String,
    /// Rounded integer frame rate. None when unknown or when the probe
    /// reported a timebase artifact (> 240).
    pub fps: Option<u32>,
    pub duration_seconds: Option<f64>,
    pub color_space: Option<String>,
    /// Matched dynamic-quality key, or an abbreviated manufacturer label.
    pub camera: Option<String>,
    /// Raw camera model string before any matching.
    pub camera_raw: Option<String>,
    /// Quality-knob override from the dynamic-quality table, when matched.
    pub custom_cq: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub metadata: Option<VideoMetadata>,
}

impl VideoFile {
    pub fn new(path: PathBuf, size_bytes: u64) -> Self {
        Self {
            path,
            size_bytes,
            metadata: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One supervised compression attempt. Lives only for the duration of the
/// attempt; created by the scheduler, mutated by the owning supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionJob {
    pub source: VideoFile,
    pub output_path: PathBuf,
    pub status: JobStatus,
    pub error_message: Option<String>,
    /// Rotation filter angle; None means no rotation.
    pub rotation: Option<u32>,
    /// Effective quality knob for this attempt (global or camera override).
    pub cq: u32,
    pub progress: f64,
    /// Set when the encode succeeded but the compression ratio was below the
    /// configured floor and the original bytes were kept instead.
    pub kept_original: bool,
    pub encode_seconds: Option<f64>,
}

impl CompressionJob {
    pub fn new(source: VideoFile, output_path: PathBuf, cq: u32, rotation: Option<u32>) -> Self {
        Self {
            source,
            output_path,
            status: JobStatus::Pending,
            error_message: None,
            rotation,
            cq,
            progress: 0.0,
            kept_original: false,
            encode_seconds: None,
        }
    }
}

/// Why a job short-circuited before (or instead of) the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipKind {
    /// The input vanished between discovery and submission.
    Deleted,
    /// The input is already AV1 and `skip_av1` is set.
    Av1,
    /// The camera filter is set and this camera did not match.
    Camera,
    /// The final output path exists but discovery did not classify it done.
    Collision,
    /// An `.err` marker appeared between discovery and submission.
    ErrMarker,
    /// Another claimant holds the `.tmp` for this output.
    Claimed,
    /// Graceful shutdown was requested before this job was admitted.
    Shutdown,
}

/// Result of one worker attempt, routed back to the scheduler.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job: CompressionJob,
    pub input_size: u64,
    pub output_size: Option<u64>,
    pub skip: Option<SkipKind>,
}

/// Discovery bucket counts, consumed by the state projection and the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryStats {
    pub files_found: u64,
    pub files_to_process: u64,
    pub already_compressed: u64,
    pub ignored_small: u64,
    pub ignored_err: u64,
    pub ignored_hw_cap: u64,
}

/// Shared cooperative-cancellation signal, observed by every supervisor in
/// its child-output loop. Setting it is one-way for the lifetime of a run.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Maps an input file under `input_root` to its projected output path under
/// `output_root`, normalizing the extension to lowercase `.mp4`.
pub fn output_path_for(input_root: &Path, output_root: &Path, source: &Path) -> PathBuf {
    let relative = source.strip_prefix(input_root).unwrap_or_else(|_| {
        // Outside the root (should not happen after discovery); fall back to
        // the bare file name so the output still lands inside the tree.
        Path::new(source.file_name().unwrap_or(source.as_os_str()))
    });
    output_root.join(relative).with_extension("mp4")
}

/// The sibling output tree for an input root: `<name>_out` next to it.
pub fn output_root_for(input_root: &Path) -> PathBuf {
    let name = input_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    input_root.with_file_name(format!("{name}_out"))
}
