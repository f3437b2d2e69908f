use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::domain::{VideoFile, VideoMetadata};
use crate::exiftool::ExifToolAdapter;
use crate::ffprobe::FfprobeAdapter;

/// Seam for metadata extraction so the scheduler can be exercised without
/// external binaries.
pub trait MetadataSource: Send + Sync {
    fn probe(&self, file: &VideoFile) -> Result<VideoMetadata>;
}

/// Production prober: ffprobe for the technical stream fields, optionally
/// exiftool for camera identification against the dynamic-quality table.
#[derive(Debug)]
pub struct MediaProber {
    ffprobe: FfprobeAdapter,
    exiftool: Option<ExifToolAdapter>,
    dynamic_cq: Vec<(String, u32)>,
}

impl MediaProber {
    pub fn new(
        ffprobe: FfprobeAdapter,
        exiftool: Option<ExifToolAdapter>,
        dynamic_cq: Vec<(String, u32)>,
    ) -> Self {
        Self {
            ffprobe,
            exiftool,
            dynamic_cq,
        }
    }
}

impl MetadataSource for MediaProber {
    fn probe(&self, file: &VideoFile) -> Result<VideoMetadata> {
        let info = self.ffprobe.stream_info(&file.path)?;
        let mut metadata = VideoMetadata {
            width: info.width,
            height: info.height,
            codec: info.codec,
            fps: info.fps,
            duration_seconds: info.duration_seconds,
            color_space: info.color_space,
            camera: None,
            camera_raw: None,
            custom_cq: None,
        };

        if let Some(exiftool) = &self.exiftool {
            match exiftool.camera_tags(&file.path) {
                Ok(tags) => {
                    resolve_camera(&mut metadata, tags.model, tags.make, &self.dynamic_cq);
                }
                Err(err) => {
                    debug!(file = %file.path.display(), error = %err, "camera tag probe failed");
                }
            }
        }

        Ok(metadata)
    }
}

/// Matches the raw camera model against the ordered dynamic-quality table.
/// On a match the camera field becomes the matched key and the quality
/// override is recorded; otherwise an abbreviated manufacturer label is set.
pub(crate) fn resolve_camera(
    metadata: &mut VideoMetadata,
    model: Option<String>,
    make: Option<String>,
    dynamic_cq: &[(String, u32)],
) {
    let Some(model) = model.filter(|m| !m.is_empty()) else {
        return;
    };
    metadata.camera_raw = Some(model.clone());

    for (pattern, cq) in dynamic_cq {
        if model.contains(pattern.as_str()) {
            metadata.camera = Some(pattern.clone());
            metadata.custom_cq = Some(*cq);
            return;
        }
    }

    let make = make.unwrap_or_default();
    let label = if make.contains("Sony") || model.contains("Sony") {
        "Sony".to_string()
    } else if make.contains("Panasonic") {
        "Pana".to_string()
    } else if make.contains("DJI") || model.contains("DJI") {
        "DJI".to_string()
    } else {
        model.chars().take(10).collect()
    };
    metadata.camera = Some(label);
}

/// Per-path metadata cache with at-most-one concurrent probe per path: the
/// second caller blocks on the first caller's cell and observes its result.
/// Probe failures are cached as `None` so a corrupted input is not re-probed
/// by every consumer; entries are dropped when the owning job finalizes.
pub struct MetadataCache {
    source: Arc<dyn MetadataSource>,
    cells: Mutex<HashMap<PathBuf, Arc<OnceCell<Option<VideoMetadata>>>>>,
}

impl MetadataCache {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            cells: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, file: &VideoFile) -> Option<VideoMetadata> {
        let cell = {
            let mut cells = self.cells.lock().expect("metadata cache poisoned");
            cells
                .entry(file.path.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_init(|| match self.source.probe(file) {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                warn!(file = %file.path.display(), error = %err, "metadata probe failed");
                None
            }
        })
        .clone()
    }

    /// Drops the cache entry for a finalized job so the cache stays bounded
    /// by the number of live pending + in-flight entries.
    pub fn invalidate(&self, path: &Path) {
        let mut cells = self.cells.lock().expect("metadata cache poisoned");
        cells.remove(path);
    }

    pub fn len(&self) -> usize {
        self.cells.lock().expect("metadata cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("entries", &self.len())
            .finish()
    }
}
