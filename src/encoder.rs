use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::GeneralConfig;
use crate::domain::{CancelFlag, CompressionJob, JobStatus};
use crate::events::{EventBus, PipelineEvent};
use crate::exiftool::ExifToolAdapter;
use crate::markers::{HW_CAP_SIGNATURE, MarkerStore, TmpClaim};

/// Diagnostic-stream signatures for the two color-metadata defects that the
/// repair sub-pipeline can cure.
pub const COLOR_PRIMARIES_SIGNATURE: &str = "is not a valid value for color_primaries";
pub const COLOR_TRC_SIGNATURE: &str = "is not a valid value for color_trc";

/// Exit code some encoder builds use for capability refusals, alongside the
/// textual signature.
const HW_CAP_EXIT_CODE: i32 = 187;

const TERMINATE_TIMEOUT: Duration = Duration::from_secs(3);
const KILL_TIMEOUT: Duration = Duration::from_secs(3);
const JOB_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);
const READ_POLL_INTERVAL: Duration = Duration::from_millis(250);
const STDERR_TAIL_LINES: usize = 40;

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=(\d+):(\d+):(\d+(?:\.\d+)?)").expect("time regex"));

/// Seam between the scheduler and the encoder process supervisor, so the
/// scheduler can be exercised with a stub that never spawns anything.
pub trait Encoder: Send + Sync {
    /// Blocks until the job reaches a terminal status; mutates `job.status`
    /// and, on failure, `job.error_message`. An `Err` return means the
    /// supervisor itself blew up before reaching a terminal classification.
    fn compress(
        &self,
        job: &mut CompressionJob,
        config: &GeneralConfig,
        cancel: &CancelFlag,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
struct LineSignals {
    hw_cap: bool,
    color_defect: bool,
}

fn screen_line(line: &str) -> LineSignals {
    LineSignals {
        hw_cap: line.contains(HW_CAP_SIGNATURE),
        color_defect: line.contains(COLOR_PRIMARIES_SIGNATURE)
            || line.contains(COLOR_TRC_SIGNATURE),
    }
}

/// Parses the elapsed position out of an ffmpeg `-stats` sample line.
fn parse_progress_seconds(line: &str) -> Option<f64> {
    let caps = TIME_RE.captures(line)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// In-flight samples are clamped just under 100 so an exact 100% only ever
/// comes from the terminal state transition.
fn progress_percent(duration: Option<f64>, elapsed: f64) -> Option<f64> {
    let duration = duration.filter(|d| *d > 0.0)?;
    Some((elapsed / duration * 100.0).min(99.9))
}

/// The achieved ratio must clear the configured floor; otherwise the original
/// bytes are kept.
fn should_keep_original(input_size: u64, output_size: u64, min_compression_ratio: f64) -> bool {
    if input_size == 0 {
        return false;
    }
    let ratio = output_size as f64 / input_size as f64;
    ratio > 1.0 - min_compression_ratio
}

enum EncodePass {
    Finished,
    /// A color-metadata signature was observed; the caller decides whether to
    /// run the repair sub-pipeline.
    ColorDefect,
}

/// Builds and supervises one ffmpeg invocation per attempt. Owns the child
/// exclusively; the diagnostic stream is serviced by a reader thread so
/// cancellation is observed even while the encoder is silent.
pub struct FfmpegAdapter {
    binary: PathBuf,
    bus: Arc<EventBus>,
    markers: MarkerStore,
    exiftool: Option<ExifToolAdapter>,
}

impl FfmpegAdapter {
    pub fn new(
        binary: PathBuf,
        bus: Arc<EventBus>,
        markers: MarkerStore,
        exiftool: Option<ExifToolAdapter>,
    ) -> Self {
        Self {
            binary,
            bus,
            markers,
            exiftool,
        }
    }

    fn build_args(
        config: &GeneralConfig,
        cq: u32,
        rotation: Option<u32>,
        input: &Path,
        tmp_output: &Path,
    ) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();

        // -y overwrites the 0-byte tmp created by the claim. Warning level is
        // the floor at which ffmpeg still emits the color-metadata
        // diagnostics the signature screen watches for.
        args.extend(["-y", "-hide_banner", "-loglevel", "warning", "-stats"].map(String::from));
        if config.gpu {
            args.extend(["-vsync", "0", "-hwaccel", "cuda"].map(String::from));
        }
        // Repair broken timestamps up front: generate missing PTS, ignore
        // input DTS, clamp negative timestamps to zero.
        args.extend(["-fflags", "+genpts+igndts", "-avoid_negative_ts", "make_zero"].map(String::from));
        args.push("-i".to_string());
        args.push(input.to_string_lossy().into_owned());

        match rotation {
            Some(90) => args.extend(["-vf", "transpose=1"].map(String::from)),
            Some(180) => args.extend(["-vf", "hflip,vflip"].map(String::from)),
            Some(270) => args.extend(["-vf", "transpose=2"].map(String::from)),
            _ => {}
        }

        if config.gpu {
            args.extend(["-c:v", "av1_nvenc", "-preset", "p7"].map(String::from));
            args.push("-cq".to_string());
            args.push(cq.to_string());
            args.extend(["-b:v", "0"].map(String::from));
        } else {
            args.extend(["-c:v", "libsvtav1", "-preset", "8"].map(String::from));
            args.push("-crf".to_string());
            args.push(cq.to_string());
        }

        args.extend(["-c:a", "copy"].map(String::from));
        if config.copy_metadata {
            args.extend(["-map_metadata", "0", "-movflags", "use_metadata_tags"].map(String::from));
        }

        args.extend(["-f", "mp4"].map(String::from));
        args.push(tmp_output.to_string_lossy().into_owned());
        args
    }

    fn spawn_reader(child: &mut Child) -> Receiver<String> {
        let (tx, rx) = bounded::<String>(256);
        if let Some(stderr) = child.stderr.take() {
            thread::Builder::new()
                .name("encoder-stderr-reader".to_string())
                .spawn(move || {
                    let reader = BufReader::new(stderr);
                    for line in reader.lines() {
                        let Ok(line) = line else { break };
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                })
                .expect("failed to spawn stderr reader thread");
        }
        rx
    }

    /// Polite terminate, bounded wait, then hard kill with a second bounded
    /// wait. The child never outlives this call by more than the timeouts.
    fn shutdown_child(child: &mut Child) {
        terminate_child(child);
        if wait_with_timeout(child, TERMINATE_TIMEOUT).is_none() {
            let _ = child.kill();
            let _ = wait_with_timeout(child, KILL_TIMEOUT);
        }
    }

    fn write_failure_marker(&self, job: &CompressionJob, tail: &[String]) {
        let content = if tail.is_empty() {
            job.error_message.clone().unwrap_or_default()
        } else {
            tail.join("\n")
        };
        if let Err(err) = self.markers.record_failure(&job.output_path, &content) {
            warn!(output = %job.output_path.display(), error = %err, "failed to write error marker");
        }
    }

    /// Bitstream-level remux that rewrites the color metadata to standard
    /// values. Tries the HEVC filter first, then the H.264 variant.
    fn remux_colorfix(&self, source: &Path, output: &Path) -> Result<PathBuf> {
        let fix = MarkerStore::colorfix_path(output);
        if let Some(parent) = fix.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        const FILTERS: [&str; 2] = [
            "hevc_metadata=colour_primaries=1:transfer_characteristics=1:matrix_coefficients=1",
            "h264_metadata=colour_primaries=1:transfer_characteristics=1:matrix_coefficients=1",
        ];
        for filter in FILTERS {
            let result = Command::new(&self.binary)
                .arg("-y")
                .arg("-hide_banner")
                .arg("-loglevel")
                .arg("error")
                .arg("-i")
                .arg(source.as_os_str())
                .arg("-c")
                .arg("copy")
                .arg("-bsf:v")
                .arg(filter)
                .arg(fix.as_os_str())
                .output()
                .with_context(|| format!("failed to run color remux on {}", source.display()))?;
            if result.status.success() && fix.exists() {
                return Ok(fix);
            }
            let _ = fs::remove_file(&fix);
        }
        bail!("color repair remux failed for {}", source.display());
    }

    /// Runs the repair sub-pipeline and re-invokes the encode once with the
    /// repaired input. The repair file is removed on every exit path.
    fn encode_with_repair(
        &self,
        job: &mut CompressionJob,
        config: &GeneralConfig,
        cancel: &CancelFlag,
    ) -> Result<()> {
        let fix = match self.remux_colorfix(&job.source.path, &job.output_path) {
            Ok(fix) => fix,
            Err(err) => {
                debug!(file = %job.source.path.display(), error = %err, "color repair remux failed");
                job.status = JobStatus::Failed;
                job.error_message = Some("Color fix remux failed".to_string());
                self.write_failure_marker(job, &[]);
                return Ok(());
            }
        };

        let pass = self.run_encode(job, config, cancel, &fix, true);
        let _ = fs::remove_file(&fix);
        pass.map(|_| ())
    }

    fn run_encode(
        &self,
        job: &mut CompressionJob,
        config: &GeneralConfig,
        cancel: &CancelFlag,
        input: &Path,
        is_repair_input: bool,
    ) -> Result<EncodePass> {
        let claim = match self.markers.claim(&job.output_path) {
            Ok(claim) => claim,
            Err(_) => {
                job.status = JobStatus::Skipped;
                job.error_message = Some(format!(
                    "Output {} is already claimed",
                    job.output_path.display()
                ));
                return Ok(EncodePass::Finished);
            }
        };

        let args = Self::build_args(config, job.cq, job.rotation, input, claim.path());
        debug!(file = %input.display(), ?args, "FFMPEG_START");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn ffmpeg for {}", input.display()))?;

        let lines = Self::spawn_reader(&mut child);
        let started = Instant::now();
        let duration = job
            .source
            .metadata
            .as_ref()
            .and_then(|m| m.duration_seconds);

        let mut tail: Vec<String> = Vec::new();
        let mut signals = LineSignals::default();

        loop {
            if cancel.is_cancelled() {
                Self::shutdown_child(&mut child);
                drop(claim);
                job.status = JobStatus::Interrupted;
                job.error_message = Some("Interrupted by user".to_string());
                return Ok(EncodePass::Finished);
            }
            if started.elapsed() > JOB_TIMEOUT {
                Self::shutdown_child(&mut child);
                drop(claim);
                job.status = JobStatus::Failed;
                job.error_message = Some("Compression timeout (6 hours)".to_string());
                self.write_failure_marker(job, &tail);
                return Ok(EncodePass::Finished);
            }

            match lines.recv_timeout(READ_POLL_INTERVAL) {
                Ok(line) => {
                    let seen = screen_line(&line);
                    signals.hw_cap |= seen.hw_cap;
                    signals.color_defect |= seen.color_defect;

                    if let Some(elapsed) = parse_progress_seconds(&line) {
                        if let Some(percent) = progress_percent(duration, elapsed) {
                            job.progress = percent;
                            self.bus.publish(&PipelineEvent::JobProgressUpdated {
                                job: job.clone(),
                                percent,
                            });
                        }
                    }

                    tail.push(line);
                    if tail.len() > STDERR_TAIL_LINES {
                        tail.remove(0);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                // Reader hit EOF: the child is exiting.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let status = child.wait().context("failed to wait for ffmpeg child")?;

        if cancel.is_cancelled() {
            drop(claim);
            job.status = JobStatus::Interrupted;
            job.error_message = Some("Interrupted by user".to_string());
            return Ok(EncodePass::Finished);
        }

        if signals.hw_cap || status.code() == Some(HW_CAP_EXIT_CODE) {
            drop(claim);
            job.status = JobStatus::HwCapLimit;
            job.error_message = Some(HW_CAP_SIGNATURE.to_string());
            let tail_for_marker = if tail.iter().any(|l| l.contains(HW_CAP_SIGNATURE)) {
                tail.clone()
            } else {
                vec![HW_CAP_SIGNATURE.to_string()]
            };
            self.write_failure_marker(job, &tail_for_marker);
            self.bus
                .publish(&PipelineEvent::HardwareCapabilityExceeded { job: job.clone() });
            return Ok(EncodePass::Finished);
        }

        if signals.color_defect && !is_repair_input {
            drop(claim);
            return Ok(EncodePass::ColorDefect);
        }

        if !status.success() {
            drop(claim);
            job.status = JobStatus::Failed;
            job.error_message = Some(exit_description(status));
            self.write_failure_marker(job, &tail);
            return Ok(EncodePass::Finished);
        }

        if !claim.path().exists() {
            drop(claim);
            job.status = JobStatus::Failed;
            job.error_message =
                Some("Compression succeeded but output file not found".to_string());
            self.write_failure_marker(job, &tail);
            return Ok(EncodePass::Finished);
        }

        self.finalize_success(job, config, claim, started)?;
        Ok(EncodePass::Finished)
    }

    fn finalize_success(
        &self,
        job: &mut CompressionJob,
        config: &GeneralConfig,
        claim: TmpClaim,
        started: Instant,
    ) -> Result<()> {
        let output = job.output_path.clone();
        self.markers.remove_failure_marker(&output)?;

        let output_size = fs::metadata(claim.path()).map(|m| m.len()).unwrap_or(0);
        claim.commit(&output)?;

        if should_keep_original(
            job.source.size_bytes,
            output_size,
            config.min_compression_ratio,
        ) {
            let ratio = output_size as f64 / job.source.size_bytes.max(1) as f64;
            fs::copy(&job.source.path, &output).with_context(|| {
                format!(
                    "failed to copy original {} over {}",
                    job.source.path.display(),
                    output.display()
                )
            })?;
            job.kept_original = true;
            job.error_message = Some(format!("Ratio {ratio:.2} above threshold, kept original"));
        }

        if config.copy_metadata {
            if let Some(exiftool) = &self.exiftool {
                if let Err(err) = exiftool.copy_metadata(&job.source.path, &output) {
                    warn!(file = %job.source.path.display(), error = %err, "deep metadata copy failed");
                }
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        job.status = JobStatus::Completed;
        job.progress = 100.0;
        job.encode_seconds = Some(elapsed);

        let final_size = fs::metadata(&output).map(|m| m.len()).unwrap_or(output_size);
        let saved_percent = if job.source.size_bytes > 0 {
            (1.0 - final_size as f64 / job.source.size_bytes as f64) * 100.0
        } else {
            0.0
        };
        let (width, height, fps) = job
            .source
            .metadata
            .as_ref()
            .map(|m| (m.width, m.height, m.fps.unwrap_or(0)))
            .unwrap_or_default();
        info!(
            file = %job.source.file_name(),
            resolution = format!("{width}x{height}"),
            fps,
            input_bytes = job.source.size_bytes,
            output_bytes = final_size,
            saved_percent = format!("{saved_percent:.1}"),
            seconds = format!("{elapsed:.0}"),
            "encode finished"
        );
        Ok(())
    }
}

impl Encoder for FfmpegAdapter {
    fn compress(
        &self,
        job: &mut CompressionJob,
        config: &GeneralConfig,
        cancel: &CancelFlag,
    ) -> Result<()> {
        job.status = JobStatus::Processing;

        let reserved_color_space = job
            .source
            .metadata
            .as_ref()
            .and_then(|m| m.color_space.as_deref())
            == Some("reserved");

        if reserved_color_space {
            // Known-bad container metadata: repair before the first encode
            // rather than burning a full failed pass. When the remux itself
            // fails, fall through to an ordinary attempt on the original.
            match self.remux_colorfix(&job.source.path, &job.output_path) {
                Ok(fix) => {
                    let pass = self.run_encode(job, config, cancel, &fix, true);
                    let _ = fs::remove_file(&fix);
                    pass?;
                    debug!(file = %job.source.file_name(), status = ?job.status, "FFMPEG_END");
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        file = %job.source.path.display(),
                        error = %err,
                        "pre-encode color repair failed, proceeding with original"
                    );
                }
            }
        }

        let input = job.source.path.clone();
        match self.run_encode(job, config, cancel, &input, false)? {
            EncodePass::Finished => {}
            EncodePass::ColorDefect => self.encode_with_repair(job, config, cancel)?,
        }
        debug!(file = %job.source.file_name(), status = ?job.status, "FFMPEG_END");
        Ok(())
    }
}

fn exit_description(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("ffmpeg exited with code {code}"),
        None => "ffmpeg terminated by signal".to_string(),
    }
}

#[cfg(unix)]
fn terminate_child(child: &mut Child) {
    // SIGTERM first so ffmpeg can flush and unlink cleanly; SIGKILL is the
    // escalation in `shutdown_child`.
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn terminate_child(child: &mut Child) {
    let _ = child.kill();
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    return None;
                }
                thread::sleep(Duration::from_millis(100));
            }
            Err(_) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(gpu: bool) -> GeneralConfig {
        GeneralConfig {
            gpu,
            ..GeneralConfig::default()
        }
    }

    fn args(gpu: bool, rotation: Option<u32>, copy_metadata: bool) -> Vec<String> {
        let mut cfg = config(gpu);
        cfg.copy_metadata = copy_metadata;
        FfmpegAdapter::build_args(
            &cfg,
            40,
            rotation,
            Path::new("/in/clip.mov"),
            Path::new("/out/clip.tmp"),
        )
    }

    fn flag_value(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .cloned()
    }

    #[test]
    fn hardware_path_uses_nvenc_with_constant_quality() {
        let args = args(true, None, true);
        assert_eq!(flag_value(&args, "-c:v").as_deref(), Some("av1_nvenc"));
        assert_eq!(flag_value(&args, "-preset").as_deref(), Some("p7"));
        assert_eq!(flag_value(&args, "-cq").as_deref(), Some("40"));
        assert_eq!(flag_value(&args, "-hwaccel").as_deref(), Some("cuda"));
        assert_eq!(flag_value(&args, "-b:v").as_deref(), Some("0"));
        assert!(!args.contains(&"-crf".to_string()));
    }

    #[test]
    fn software_path_uses_svtav1_with_crf() {
        let args = args(false, None, true);
        assert_eq!(flag_value(&args, "-c:v").as_deref(), Some("libsvtav1"));
        assert_eq!(flag_value(&args, "-preset").as_deref(), Some("8"));
        assert_eq!(flag_value(&args, "-crf").as_deref(), Some("40"));
        assert!(!args.contains(&"-hwaccel".to_string()));
        assert!(!args.contains(&"-cq".to_string()));
    }

    #[test]
    fn common_flags_cover_timestamps_audio_and_container() {
        let args = args(true, None, true);
        assert_eq!(flag_value(&args, "-fflags").as_deref(), Some("+genpts+igndts"));
        assert_eq!(
            flag_value(&args, "-avoid_negative_ts").as_deref(),
            Some("make_zero")
        );
        assert_eq!(flag_value(&args, "-c:a").as_deref(), Some("copy"));
        assert_eq!(flag_value(&args, "-f").as_deref(), Some("mp4"));
        assert_eq!(flag_value(&args, "-map_metadata").as_deref(), Some("0"));
        assert!(args.contains(&"/out/clip.tmp".to_string()));
    }

    #[test]
    fn global_flags_lead_and_output_path_trails() {
        for gpu in [true, false] {
            let args = args(gpu, None, true);
            assert_eq!(args[0], "-y", "overwrite flag must come first");
            assert_eq!(
                flag_value(&args, "-loglevel").as_deref(),
                Some("warning"),
                "warning level keeps color-metadata diagnostics visible"
            );
            let loglevel_pos = args.iter().position(|a| a == "-loglevel").unwrap();
            let input_pos = args.iter().position(|a| a == "-i").unwrap();
            assert!(
                loglevel_pos < input_pos,
                "global flags precede the input, got {args:?}"
            );
            assert_eq!(
                args.last().map(String::as_str),
                Some("/out/clip.tmp"),
                "output path is the final argument"
            );
        }
    }

    #[test]
    fn metadata_flags_absent_when_copy_disabled() {
        let args = args(true, None, false);
        assert!(!args.contains(&"-map_metadata".to_string()));
        assert!(!args.contains(&"use_metadata_tags".to_string()));
    }

    #[test]
    fn rotation_filters_per_angle() {
        assert_eq!(
            flag_value(&args(true, Some(90), true), "-vf").as_deref(),
            Some("transpose=1")
        );
        assert_eq!(
            flag_value(&args(true, Some(180), true), "-vf").as_deref(),
            Some("hflip,vflip")
        );
        assert_eq!(
            flag_value(&args(true, Some(270), true), "-vf").as_deref(),
            Some("transpose=2")
        );
        assert!(flag_value(&args(true, None, true), "-vf").is_none());
        assert!(flag_value(&args(true, Some(0), true), "-vf").is_none());
    }

    #[test]
    fn screen_line_detects_both_signature_classes() {
        let hw = screen_line("[av1_nvenc] Hardware is lacking required capabilities");
        assert!(hw.hw_cap);
        assert!(!hw.color_defect);

        let primaries = screen_line("2 is not a valid value for color_primaries");
        assert!(primaries.color_defect);
        let trc = screen_line("2 is not a valid value for color_trc");
        assert!(trc.color_defect);

        let clean = screen_line("frame=  100 fps= 30 time=00:00:03.33");
        assert!(!clean.hw_cap && !clean.color_defect);
    }

    #[test]
    fn progress_parsing_reads_hms_samples() {
        let line = "frame=  300 fps= 30 q=28.0 size=1024KiB time=00:01:30.50 bitrate=92.7kbits/s";
        let elapsed = parse_progress_seconds(line).expect("time sample parses");
        assert!((elapsed - 90.5).abs() < 1e-9);
        assert!(parse_progress_seconds("no progress here").is_none());
    }

    #[test]
    fn progress_percent_clamps_in_flight_samples() {
        assert_eq!(progress_percent(Some(100.0), 50.0), Some(50.0));
        assert_eq!(progress_percent(Some(100.0), 150.0), Some(99.9));
        assert_eq!(progress_percent(None, 50.0), None);
        assert_eq!(progress_percent(Some(0.0), 50.0), None);
    }

    #[test]
    fn keep_original_when_saving_is_below_floor() {
        // 10% floor: an output at 95% of the input is not worth keeping.
        assert!(should_keep_original(1000, 950, 0.1));
        assert!(!should_keep_original(1000, 800, 0.1));
        assert!(!should_keep_original(0, 100, 0.1));
    }

    #[test]
    fn exit_description_covers_code_and_signal() {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            assert_eq!(
                exit_description(ExitStatus::from_raw(0x100)),
                "ffmpeg exited with code 1"
            );
            assert_eq!(
                exit_description(ExitStatus::from_raw(libc::SIGKILL)),
                "ffmpeg terminated by signal"
            );
        }
    }
}
