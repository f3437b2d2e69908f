use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

/// Literal substring an encoder emits when the input exceeds what the
/// hardware session can handle. Its presence in an `.err` file classifies the
/// input as hardware-capability-limited rather than generally failed.
pub const HW_CAP_SIGNATURE: &str = "Hardware is lacking required capabilities";

/// Suffix of the transient color-repair remux files.
pub const COLORFIX_SUFFIX: &str = "_colorfix.mp4";

/// Classification of an output slot from what is already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputClass {
    /// Nothing on disk; the input is fair game.
    None,
    /// Final output present and newer than its source.
    Done,
    /// `.err` marker present without the capability signature.
    ErrGeneral,
    /// `.err` marker present containing the capability signature.
    ErrHw,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepCounts {
    pub tmp: u64,
    pub err: u64,
    pub colorfix: u64,
}

/// Owns the per-output sentinel files under one output tree. All run-to-run
/// persistence of the pipeline lives in these markers; there is no side
/// database.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    output_root: PathBuf,
}

impl MarkerStore {
    pub fn new(output_root: PathBuf) -> Self {
        Self { output_root }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// In-progress marker adjacent to an output: `<stem>.tmp`.
    pub fn tmp_path(output: &Path) -> PathBuf {
        output.with_extension("tmp")
    }

    /// Failure marker adjacent to an output: `<stem>.err`.
    pub fn err_path(output: &Path) -> PathBuf {
        output.with_extension("err")
    }

    /// Transient color-repair file adjacent to an output.
    pub fn colorfix_path(output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        output.with_file_name(format!("{stem}{COLORFIX_SUFFIX}"))
    }

    /// Atomically reserves the right to write `output` by creating its `.tmp`
    /// marker. Fails when another claimant already holds it. The returned
    /// handle deletes the marker on every exit path unless committed.
    pub fn claim(&self, output: &Path) -> Result<TmpClaim> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let tmp = Self::tmp_path(output);
        match fs::OpenOptions::new().write(true).create_new(true).open(&tmp) {
            Ok(_) => Ok(TmpClaim {
                tmp,
                committed: false,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                bail!("output {} is already claimed", output.display())
            }
            Err(err) => Err(err).with_context(|| format!("failed to create {}", tmp.display())),
        }
    }

    /// Writes (or overwrites) the `.err` marker for an output.
    pub fn record_failure(&self, output: &Path, message: &str) -> Result<()> {
        let err = Self::err_path(output);
        if let Some(parent) = err.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        fs::write(&err, message).with_context(|| format!("failed to write {}", err.display()))
    }

    pub fn remove_failure_marker(&self, output: &Path) -> Result<()> {
        let err = Self::err_path(output);
        if err.exists() {
            fs::remove_file(&err)
                .with_context(|| format!("failed to remove {}", err.display()))?;
        }
        Ok(())
    }

    /// Inspects the output slot for `source`. The `.err` marker is examined
    /// before the final file so a stale output next to a failure marker never
    /// reads as done.
    pub fn classify_existing(&self, source: &Path, output: &Path) -> OutputClass {
        let err = Self::err_path(output);
        if err.exists() {
            return match fs::read_to_string(&err) {
                Ok(content) if content.contains(HW_CAP_SIGNATURE) => OutputClass::ErrHw,
                _ => OutputClass::ErrGeneral,
            };
        }

        if output.exists() {
            let newer_than_source = match (fs::metadata(output), fs::metadata(source)) {
                (Ok(out_meta), Ok(src_meta)) => match (out_meta.modified(), src_meta.modified()) {
                    (Ok(out_time), Ok(src_time)) => out_time > src_time,
                    _ => false,
                },
                _ => false,
            };
            if newer_than_source {
                return OutputClass::Done;
            }
        }

        OutputClass::None
    }

    /// Startup sweep: no supervisor can own a `.tmp` at process start, and
    /// color-repair intermediates are never meaningful across runs. `.err`
    /// markers are swept only in clean-errors mode.
    pub fn housekeeping_sweep(&self, clean_errors: bool) -> Result<SweepCounts> {
        let mut counts = SweepCounts::default();
        if !self.output_root.exists() {
            return Ok(counts);
        }

        let mut stack = vec![self.output_root.clone()];
        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir)
                .with_context(|| format!("failed to read directory {}", dir.display()))?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if name.ends_with(".tmp") {
                    fs::remove_file(&path)
                        .with_context(|| format!("failed to remove {}", path.display()))?;
                    counts.tmp += 1;
                } else if name.ends_with(COLORFIX_SUFFIX) {
                    fs::remove_file(&path)
                        .with_context(|| format!("failed to remove {}", path.display()))?;
                    counts.colorfix += 1;
                } else if clean_errors && name.ends_with(".err") {
                    fs::remove_file(&path)
                        .with_context(|| format!("failed to remove {}", path.display()))?;
                    counts.err += 1;
                }
            }
        }

        if counts.tmp > 0 || counts.err > 0 || counts.colorfix > 0 {
            info!(
                tmp = counts.tmp,
                err = counts.err,
                colorfix = counts.colorfix,
                "cleaned up stale marker files"
            );
        }
        Ok(counts)
    }
}

/// RAII ownership of one `.tmp` marker. The encoder writes into the marker
/// path; `commit` renames it onto the final output, and dropping an
/// uncommitted claim deletes the marker so no partial output survives.
#[derive(Debug)]
pub struct TmpClaim {
    tmp: PathBuf,
    committed: bool,
}

impl TmpClaim {
    pub fn path(&self) -> &Path {
        &self.tmp
    }

    /// Atomically publishes the claimed bytes as the final output.
    pub fn commit(mut self, output: &Path) -> Result<()> {
        fs::rename(&self.tmp, output).with_context(|| {
            format!(
                "failed to rename {} -> {}",
                self.tmp.display(),
                output.display()
            )
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for TmpClaim {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}
