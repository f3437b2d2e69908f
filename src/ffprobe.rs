use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Parsed output of one stream/format probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamInfo {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub fps: Option<u32>,
    pub duration_seconds: Option<f64>,
    pub color_space: Option<String>,
}

/// Thin wrapper around the ffprobe binary.
#[derive(Debug, Clone)]
pub struct FfprobeAdapter {
    binary: PathBuf,
}

impl FfprobeAdapter {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Probes the first video stream plus container duration. A nonzero exit
    /// is surfaced as an error; callers treat that as a corrupted input.
    pub fn stream_info(&self, source: &Path) -> Result<StreamInfo> {
        let output = Command::new(&self.binary)
            .arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg("v:0")
            .arg("-show_entries")
            .arg("stream=codec_name,width,height,avg_frame_rate,color_space")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1")
            .arg(source.as_os_str())
            .output()
            .with_context(|| format!("failed to run ffprobe on {}", source.display()))?;

        if !output.status.success() {
            bail!(
                "ffprobe failed for {}: {}",
                source.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(parse_stream_info(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses ffprobe's `key=value` default writer output.
pub(crate) fn parse_stream_info(stdout: &str) -> StreamInfo {
    let mut info = StreamInfo::default();
    for line in stdout.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() || value == "N/A" {
            continue;
        }
        match key.trim() {
            "codec_name" => info.codec = value.to_ascii_lowercase(),
            "width" => info.width = value.parse().unwrap_or(0),
            "height" => info.height = value.parse().unwrap_or(0),
            "avg_frame_rate" => info.fps = parse_frame_rate(value),
            "duration" => info.duration_seconds = value.parse().ok(),
            "color_space" => info.color_space = Some(value.to_string()),
            _ => {}
        }
    }
    info
}

/// `avg_frame_rate` comes as a rational ("30000/1001") or a plain float.
/// Values above 240 are container timebases rather than real frame rates and
/// are rejected.
pub(crate) fn parse_frame_rate(raw: &str) -> Option<u32> {
    let value = if let Some((num, den)) = raw.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        num / den
    } else {
        raw.trim().parse().ok()?
    };

    let rounded = value.round();
    if rounded <= 0.0 || rounded > 240.0 {
        return None;
    }
    Some(rounded as u32)
}
