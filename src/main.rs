use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vbatch::{
    AppConfig, Encoder, EventBus, ExifToolAdapter, FfmpegAdapter, FfprobeAdapter, FileScanner,
    MarkerStore, MediaProber, MetadataCache, Orchestrator, RunOutcome, StateSnapshot, ToolKind,
    UiManager, UiState, ensure_available, load_config, output_root_for,
};

#[derive(Parser, Debug)]
#[command(
    name = "vbatch",
    version,
    about = "Batch video compression: re-encode a directory tree of videos into AV1"
)]
struct Cli {
    /// Directory containing videos to compress
    input_dir: PathBuf,

    /// Path to a JSON config file (defaults to ./vbatch.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the worker admission cap (1-16)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Override the constant-quality knob (0-63)
    #[arg(long)]
    cq: Option<u32>,

    /// Force the hardware encode path
    #[arg(long, conflicts_with = "cpu")]
    gpu: bool,

    /// Force the software encode path
    #[arg(long)]
    cpu: bool,

    /// Remove existing .err markers and retry those inputs
    #[arg(long)]
    clean_errors: bool,

    /// Skip inputs that are already AV1
    #[arg(long)]
    skip_av1: bool,

    /// Minimum input size in bytes to process
    #[arg(long)]
    min_size: Option<u64>,

    /// Verbose debug logging
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(outcome) if outcome.interrupted => {
            eprintln!("\nInterrupted by user");
            std::process::exit(130);
        }
        Ok(_) => {}
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(2);
        }
    }
}

fn load_effective_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let default_path = Path::new("vbatch.json");
            if default_path.exists() {
                load_config(default_path)?
            } else {
                AppConfig::default()
            }
        }
    };

    if let Some(threads) = cli.threads {
        config.general.threads = threads;
    }
    if let Some(cq) = cli.cq {
        config.general.cq = cq;
    }
    if cli.gpu {
        config.general.gpu = true;
    }
    if cli.cpu {
        config.general.gpu = false;
    }
    if cli.clean_errors {
        config.general.clean_errors = true;
    }
    if cli.skip_av1 {
        config.general.skip_av1 = true;
    }
    if let Some(min_size) = cli.min_size {
        config.general.min_size_bytes = min_size;
    }
    if cli.debug {
        config.general.debug = true;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn init_logging(
    output_root: &Path,
    debug: bool,
) -> tracing_appender::non_blocking::WorkerGuard {
    let appender = tracing_appender::rolling::never(output_root, "compression.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}

fn run(cli: Cli) -> Result<RunOutcome> {
    if !cli.input_dir.is_dir() {
        bail!("input directory {} does not exist", cli.input_dir.display());
    }
    let config = load_effective_config(&cli)?;

    let output_root = output_root_for(&cli.input_dir);
    fs::create_dir_all(&output_root)
        .with_context(|| format!("failed to create output root {}", output_root.display()))?;
    let _log_guard = init_logging(&output_root, config.general.debug);
    info!(
        input = %cli.input_dir.display(),
        output = %output_root.display(),
        threads = config.general.threads,
        cq = config.general.cq,
        gpu = config.general.gpu,
        "vbatch started"
    );

    // Required external tools; exiftool degrades to off when missing.
    let ffmpeg = ensure_available(ToolKind::Ffmpeg, &config.tools)?;
    let ffprobe = ensure_available(ToolKind::Ffprobe, &config.tools)?;
    let exiftool = if config.general.use_exif {
        match ensure_available(ToolKind::Exiftool, &config.tools) {
            Ok(path) => Some(ExifToolAdapter::new(path)),
            Err(err) => {
                warn!(error = %err, "exiftool unavailable, camera identification disabled");
                None
            }
        }
    } else {
        None
    };

    let markers = Arc::new(MarkerStore::new(output_root));
    markers.housekeeping_sweep(config.general.clean_errors)?;

    let bus = Arc::new(EventBus::new());
    let state = Arc::new(UiState::new());
    UiManager::attach(&bus, state.clone());
    state.set_threads(config.general.threads);
    state.set_usage(vbatch::monitor::sample_usage());

    let prober = MediaProber::new(
        FfprobeAdapter::new(ffprobe),
        exiftool.clone(),
        config.general.dynamic_cq.clone(),
    );
    let cache = Arc::new(MetadataCache::new(Arc::new(prober)));
    let encoder: Arc<dyn Encoder> = Arc::new(FfmpegAdapter::new(
        ffmpeg,
        bus.clone(),
        (*markers).clone(),
        exiftool,
    ));
    let scanner = FileScanner::new(config.normalized_extensions(), config.general.min_size_bytes);

    let orchestrator = Orchestrator::new(config, bus, scanner, markers, cache, encoder, state.clone());
    vbatch::install_interrupt_handler();

    let outcome = orchestrator.run(&cli.input_dir)?;
    print_summary(&state.snapshot(), outcome.interrupted);
    Ok(outcome)
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

fn print_summary(snapshot: &StateSnapshot, interrupted: bool) {
    let header = if interrupted {
        "Run interrupted"
    } else {
        "Run finished"
    };
    println!(
        "{header} in {}: {} compressed, {} failed, {} hw-cap, {} skipped, {} camera, {} av1, {} interrupted",
        format_duration(snapshot.elapsed_seconds),
        snapshot.completed,
        snapshot.failed,
        snapshot.hw_cap,
        snapshot.skipped,
        snapshot.camera_skipped,
        snapshot.av1_skipped,
        snapshot.interrupted,
    );
    if snapshot.total_input_bytes > 0 {
        println!(
            "Bytes: {} -> {} (saved {}, {:.1}%)",
            format_size(snapshot.total_input_bytes),
            format_size(snapshot.total_output_bytes),
            format_size(snapshot.space_saved_bytes),
            (1.0 - snapshot.compression_ratio) * 100.0,
        );
        println!(
            "Throughput: {}/s over {}",
            format_size(snapshot.throughput_bytes_per_sec as u64),
            format_duration(snapshot.elapsed_seconds),
        );
    }
    if snapshot.ratio_kept > 0 {
        println!(
            "{} output(s) kept as originals (compression below the configured floor)",
            snapshot.ratio_kept
        );
    }
    if snapshot.discovery.ignored_err > 0 || snapshot.discovery.ignored_hw_cap > 0 {
        println!(
            "Skipped at discovery: {} error-marked, {} hardware-capability-marked",
            snapshot.discovery.ignored_err, snapshot.discovery.ignored_hw_cap,
        );
    }
}
