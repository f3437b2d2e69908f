use std::sync::{Mutex, OnceLock};

use nvml_wrapper::Nvml;
use nvml_wrapper::error::NvmlError;
use serde::Serialize;
use sysinfo::System;

/// Point-in-time encoder-host utilization, attached to the state projection
/// for observers.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemUsage {
    pub cpu_percent: f32,
    pub gpu: Option<GpuUsage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuUsage {
    pub utilization_percent: u32,
    pub memory_percent: Option<u32>,
}

/// Samples overall CPU utilization. The `System` instance is cached so the
/// sampler's internal baseline is warmed once per process.
pub fn sample_cpu() -> f32 {
    static SYSTEM: OnceLock<Mutex<System>> = OnceLock::new();

    let mut sys = SYSTEM
        .get_or_init(|| {
            let mut sys = System::new();
            sys.refresh_cpu_usage();
            Mutex::new(sys)
        })
        .lock()
        .expect("cpu sampler poisoned");
    sys.refresh_cpu_usage();

    let cpus = sys.cpus();
    if cpus.is_empty() {
        return 0.0;
    }
    cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
}

fn try_sample_gpu() -> Result<Option<GpuUsage>, NvmlError> {
    // NVML init is expensive and fails permanently on hosts without an
    // NVIDIA driver; keep one shared handle and fail fast after the first
    // unsuccessful attempt.
    static NVML: OnceLock<Option<Nvml>> = OnceLock::new();

    let Some(nvml) = NVML.get_or_init(|| Nvml::init().ok()) else {
        return Ok(None);
    };

    if nvml.device_count()? == 0 {
        return Ok(None);
    }
    let device = nvml.device_by_index(0)?;
    let utilization = device.utilization_rates()?;
    let memory = device.memory_info()?;
    let memory_percent = if memory.total > 0 {
        Some(((memory.used as f64 / memory.total as f64) * 100.0).round() as u32)
    } else {
        None
    };

    Ok(Some(GpuUsage {
        utilization_percent: utilization.gpu,
        memory_percent,
    }))
}

/// Combined CPU + GPU snapshot; GPU is absent on hosts without NVML.
pub fn sample_usage() -> SystemUsage {
    SystemUsage {
        cpu_percent: sample_cpu(),
        gpu: try_sample_gpu().unwrap_or(None),
    }
}
