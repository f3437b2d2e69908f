use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::domain::{DiscoveryStats, VideoFile, output_path_for};
use crate::markers::{MarkerStore, OutputClass};

/// Directories deeper than this below the input root are not walked.
const MAX_SCAN_DEPTH: usize = 3;

/// Result of one discovery pass: the files that should be encoded, in
/// ascending path order, plus the bucket counts for the projection.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub ready: Vec<VideoFile>,
    pub stats: DiscoveryStats,
}

/// Walks the input tree and classifies every candidate against the marker
/// store: ready, already done, error-skipped, hw-skipped, or too small.
#[derive(Debug, Clone)]
pub struct FileScanner {
    extensions: Vec<String>,
    min_size_bytes: u64,
}

impl FileScanner {
    /// `extensions` must be lowercase with a leading dot
    /// (see `AppConfig::normalized_extensions`).
    pub fn new(extensions: Vec<String>, min_size_bytes: u64) -> Self {
        Self {
            extensions,
            min_size_bytes,
        }
    }

    fn extension_matches(&self, path: &Path) -> bool {
        let Some(ext) = path.extension() else {
            return false;
        };
        let ext = format!(".{}", ext.to_string_lossy().to_ascii_lowercase());
        self.extensions.iter().any(|allowed| *allowed == ext)
    }

    /// One discovery pass. `clean_errors` turns error-marked inputs back into
    /// ready work by deleting their markers on the spot.
    pub fn discover(
        &self,
        input_root: &Path,
        output_root: &Path,
        markers: &MarkerStore,
        clean_errors: bool,
    ) -> Result<Discovery> {
        debug!(directory = %input_root.display(), "DISCOVERY_START");
        let mut stats = DiscoveryStats::default();
        let mut ready = Vec::new();

        let mut stack = vec![(input_root.to_path_buf(), 0usize)];
        while let Some((dir, depth)) = stack.pop() {
            let entries = fs::read_dir(&dir)
                .with_context(|| format!("failed to read directory {}", dir.display()))?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    // The parallel output tree sits next to (or occasionally
                    // inside) the input root; never descend into it.
                    if name.ends_with("_out") {
                        continue;
                    }
                    if depth < MAX_SCAN_DEPTH {
                        stack.push((path, depth + 1));
                    }
                    continue;
                }

                if !self.extension_matches(&path) {
                    continue;
                }
                stats.files_found += 1;

                let size = match fs::metadata(&path) {
                    Ok(meta) => meta.len(),
                    Err(_) => continue,
                };
                if size < self.min_size_bytes {
                    stats.ignored_small += 1;
                    continue;
                }

                let output = output_path_for(input_root, output_root, &path);
                match markers.classify_existing(&path, &output) {
                    OutputClass::Done => stats.already_compressed += 1,
                    OutputClass::ErrHw => stats.ignored_hw_cap += 1,
                    OutputClass::ErrGeneral => {
                        if clean_errors {
                            markers.remove_failure_marker(&output)?;
                            ready.push(VideoFile::new(path, size));
                        } else {
                            stats.ignored_err += 1;
                        }
                    }
                    OutputClass::None => ready.push(VideoFile::new(path, size)),
                }
            }
        }

        ready.sort_by(|a, b| a.path.cmp(&b.path));
        stats.files_to_process = ready.len() as u64;

        info!(
            found = stats.files_found,
            to_process = stats.files_to_process,
            already_compressed = stats.already_compressed,
            ignored_small = stats.ignored_small,
            ignored_err = stats.ignored_err,
            ignored_hw_cap = stats.ignored_hw_cap,
            "DISCOVERY_END"
        );
        Ok(Discovery { ready, stats })
    }
}
