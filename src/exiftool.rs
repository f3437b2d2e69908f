use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use serde_json::Value;

/// Camera identification tags pulled from the deep-metadata tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraTags {
    pub model: Option<String>,
    pub make: Option<String>,
}

/// Thin wrapper around the exiftool binary, used for camera identification
/// and for the post-encode deep metadata copy.
#[derive(Debug, Clone)]
pub struct ExifToolAdapter {
    binary: PathBuf,
}

impl ExifToolAdapter {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Queries model/make-style tags for camera identification. Tag aliases
    /// differ per container, so several are requested and the first present
    /// one wins.
    pub fn camera_tags(&self, source: &Path) -> Result<CameraTags> {
        let output = Command::new(&self.binary)
            .arg("-j")
            .arg("-Model")
            .arg("-Make")
            .arg("-DeviceModelName")
            .arg("-Encoder")
            .arg(source.as_os_str())
            .output()
            .with_context(|| format!("failed to run exiftool on {}", source.display()))?;

        if !output.status.success() {
            bail!(
                "exiftool failed for {}: {}",
                source.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        parse_camera_tags(&String::from_utf8_lossy(&output.stdout))
    }

    /// Copies all tags (GPS, lens info, maker notes) from source to target,
    /// remapped into the XMP and QuickTime groups so they survive inside an
    /// MP4 container.
    pub fn copy_metadata(&self, source: &Path, target: &Path) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("-tagsFromFile")
            .arg(source.as_os_str())
            .arg("-XMP:all<all")
            .arg("-QuickTime:all<all")
            .arg("-all:all")
            .arg("-unsafe")
            .arg("-overwrite_original")
            .arg(target.as_os_str())
            .output()
            .with_context(|| format!("failed to run exiftool copy onto {}", target.display()))?;

        if !output.status.success() {
            bail!(
                "exiftool metadata copy failed for {}: {}",
                target.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

fn string_tag(entry: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(value) = entry.get(*key) {
            let text = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

pub(crate) fn parse_camera_tags(stdout: &str) -> Result<CameraTags> {
    let parsed: Value =
        serde_json::from_str(stdout).context("failed to parse exiftool JSON output")?;
    let Some(entry) = parsed.as_array().and_then(|entries| entries.first()) else {
        bail!("exiftool returned no entries");
    };

    Ok(CameraTags {
        model: string_tag(entry, &["Model", "DeviceModelName", "Encoder"]),
        make: string_tag(entry, &["Make"]),
    })
}
