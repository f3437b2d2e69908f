use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

use crate::config::ToolPaths;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Ffmpeg,
    Ffprobe,
    Exiftool,
}

impl ToolKind {
    pub fn binary_name(self) -> &'static str {
        match self {
            ToolKind::Ffmpeg => "ffmpeg",
            ToolKind::Ffprobe => "ffprobe",
            ToolKind::Exiftool => "exiftool",
        }
    }

    fn version_arg(self) -> &'static str {
        match self {
            ToolKind::Ffmpeg | ToolKind::Ffprobe => "-version",
            ToolKind::Exiftool => "-ver",
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0} does not appear to be available; install it or configure an explicit path")]
    Unavailable(&'static str),
}

/// Explicit configured path, or the bare binary name resolved via PATH.
pub fn resolve_tool(kind: ToolKind, paths: &ToolPaths) -> PathBuf {
    let configured = match kind {
        ToolKind::Ffmpeg => paths.ffmpeg_path.as_deref(),
        ToolKind::Ffprobe => paths.ffprobe_path.as_deref(),
        ToolKind::Exiftool => paths.exiftool_path.as_deref(),
    };
    configured
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(kind.binary_name()))
}

/// Cheap startup probe: the binary must run and answer its version query.
pub fn verify_tool(kind: ToolKind, path: &Path) -> bool {
    let ok = Command::new(path)
        .arg(kind.version_arg())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false);
    debug!(tool = kind.binary_name(), path = %path.display(), available = ok, "tool probe");
    ok
}

/// Resolves and verifies one required external tool.
pub fn ensure_available(kind: ToolKind, paths: &ToolPaths) -> Result<PathBuf, ToolError> {
    let path = resolve_tool(kind, paths);
    if verify_tool(kind, &path) {
        Ok(path)
    } else {
        Err(ToolError::Unavailable(kind.binary_name()))
    }
}
