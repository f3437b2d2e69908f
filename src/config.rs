use std::fs;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ceiling for the admission cap and for the worker pool: the hardware
/// encoder refuses more simultaneous sessions than this.
pub const MAX_THREADS: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid rotation angle {angle} for pattern {pattern:?}; must be 0, 90, 180 or 270")]
    InvalidRotationAngle { pattern: String, angle: u32 },
    #[error("cq {0} is out of range (0-63)")]
    CqOutOfRange(u32),
    #[error("threads must be at least 1")]
    ZeroThreads,
    #[error("prefetch_factor must be at least 1")]
    ZeroPrefetch,
}

/// Optional explicit paths for the external binaries. Unset fields resolve
/// through the system PATH.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolPaths {
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
    pub exiftool_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct GeneralConfig {
    /// Initial value of the admission cap.
    pub threads: usize,
    /// Default constant-quality knob.
    pub cq: u32,
    /// In-flight multiplier: the scheduler keeps at most
    /// `prefetch_factor * cap` jobs submitted at once.
    pub prefetch_factor: usize,
    /// Hardware encode path when true, software path when false.
    pub gpu: bool,
    pub copy_metadata: bool,
    /// Enables the deep-metadata probe for camera identification.
    pub use_exif: bool,
    /// Camera substring whitelist; empty accepts everything.
    pub filter_cameras: Vec<String>,
    /// Ordered camera-substring -> quality-knob overrides; first match wins.
    pub dynamic_cq: Vec<(String, u32)>,
    pub extensions: Vec<String>,
    pub min_size_bytes: u64,
    /// Delete `.err` markers at startup and re-attempt those inputs.
    pub clean_errors: bool,
    pub skip_av1: bool,
    /// Keep the original bytes when the achieved saving falls below this.
    pub min_compression_ratio: f64,
    pub debug: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            cq: 45,
            prefetch_factor: 1,
            gpu: true,
            copy_metadata: true,
            use_exif: true,
            filter_cameras: Vec::new(),
            dynamic_cq: Vec::new(),
            extensions: vec![
                ".mp4".to_string(),
                ".mov".to_string(),
                ".avi".to_string(),
                ".flv".to_string(),
                ".webm".to_string(),
            ],
            min_size_bytes: 1024 * 1024,
            clean_errors: false,
            skip_av1: false,
            min_compression_ratio: 0.1,
            debug: false,
        }
    }
}

/// Filename-pattern driven rotation. Patterns are regexes matched
/// case-insensitively against the bare file name, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AutoRotateConfig {
    pub patterns: Vec<(String, u32)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub autorotate: AutoRotateConfig,
    pub tools: ToolPaths,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.general.prefetch_factor == 0 {
            return Err(ConfigError::ZeroPrefetch);
        }
        if self.general.cq > 63 {
            return Err(ConfigError::CqOutOfRange(self.general.cq));
        }
        for (_, cq) in &self.general.dynamic_cq {
            if *cq > 63 {
                return Err(ConfigError::CqOutOfRange(*cq));
            }
        }
        for (pattern, angle) in &self.autorotate.patterns {
            if !matches!(angle, 0 | 90 | 180 | 270) {
                return Err(ConfigError::InvalidRotationAngle {
                    pattern: pattern.clone(),
                    angle: *angle,
                });
            }
        }
        Ok(())
    }

    /// Extensions normalized to lowercase with a leading dot.
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.general
            .extensions
            .iter()
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect()
    }
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open config file {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("failed to parse JSON from {}", path.display()))
}
