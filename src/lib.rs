pub mod config;
pub mod domain;
pub mod encoder;
pub mod events;
pub mod exiftool;
pub mod ffprobe;
pub mod manager;
pub mod markers;
pub mod monitor;
pub mod orchestrator;
pub mod probe;
pub mod scanner;
pub mod state;
pub mod tools;

pub use config::{
    AppConfig, AutoRotateConfig, ConfigError, GeneralConfig, MAX_THREADS, ToolPaths, load_config,
};
pub use domain::{
    CancelFlag, CompressionJob, DiscoveryStats, JobOutcome, JobStatus, SkipKind, VideoFile,
    VideoMetadata, output_path_for, output_root_for,
};
pub use encoder::{Encoder, FfmpegAdapter};
pub use events::{EventBus, EventKind, PipelineEvent};
pub use exiftool::ExifToolAdapter;
pub use ffprobe::FfprobeAdapter;
pub use manager::UiManager;
pub use markers::{HW_CAP_SIGNATURE, MarkerStore, OutputClass, TmpClaim};
pub use monitor::{GpuUsage, SystemUsage};
pub use orchestrator::{
    Orchestrator, RunOutcome, ThreadController, install_interrupt_handler, interrupt_pending,
};
pub use probe::{MediaProber, MetadataCache, MetadataSource};
pub use scanner::{Discovery, FileScanner};
pub use state::{StateSnapshot, UiState};
pub use tools::{ToolError, ToolKind, ensure_available};
