//! Machine resource checks run before any subsystem is created.
//!
//! Checks run in a fixed order (storage, CPU, memory) and stop at the first
//! failure so the caller can tell the user exactly which requirement is unmet.

use std::path::{Path, PathBuf};

use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Allocation unit assumed when the OS does not report one.
pub const DEFAULT_CLUSTER_BYTES: u64 = 4096;

/// Free space on a drive, in allocation units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpace {
    /// Free clusters available to the current user.
    pub available_clusters: u64,
    /// Bytes per cluster.
    pub bytes_per_cluster: u64,
}

impl DiskSpace {
    /// Free space in bytes.
    pub fn available_bytes(&self) -> u64 {
        self.available_clusters.saturating_mul(self.bytes_per_cluster)
    }
}

/// Source of machine capability information.
pub trait SystemProbe {
    /// Free space on the drive containing `path`, or `None` if unknown.
    fn disk_space(&self, path: &Path) -> Option<DiskSpace>;
    /// Nominal clock speed of the first CPU in MHz, 0 if unavailable.
    fn cpu_speed_mhz(&self) -> u64;
    /// Installed physical memory in bytes, 0 if unavailable.
    fn physical_memory_bytes(&self) -> u64;
}

/// [`SystemProbe`] backed by the `sysinfo` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoProbe;

impl SystemProbe for SysinfoProbe {
    fn disk_space(&self, path: &Path) -> Option<DiskSpace> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .filter(|d| path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())?;
        Some(DiskSpace {
            available_clusters: disk.available_space() / DEFAULT_CLUSTER_BYTES,
            bytes_per_cluster: DEFAULT_CLUSTER_BYTES,
        })
    }

    fn cpu_speed_mhz(&self) -> u64 {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_frequency()),
        );
        system.cpus().first().map_or(0, |cpu| cpu.frequency())
    }

    fn physical_memory_bytes(&self) -> u64 {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        system.total_memory()
    }
}

/// Which preflight check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightCheck {
    Storage,
    Cpu,
    Memory,
}

/// A failed preflight check.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreflightError {
    #[error("not enough free disk space: {required_bytes} bytes needed, {available_bytes} available")]
    InsufficientStorage {
        required_bytes: u64,
        available_bytes: u64,
    },

    #[error("CPU is too slow for this game: {required_mhz} MHz needed, {detected_mhz} MHz detected")]
    CpuTooSlow { required_mhz: u64, detected_mhz: u64 },

    #[error("not enough physical memory: {required_bytes} bytes needed, {available_bytes} installed")]
    InsufficientMemory {
        required_bytes: u64,
        available_bytes: u64,
    },
}

impl PreflightError {
    /// The check that produced this error.
    pub fn check(&self) -> PreflightCheck {
        match self {
            Self::InsufficientStorage { .. } => PreflightCheck::Storage,
            Self::CpuTooSlow { .. } => PreflightCheck::Cpu,
            Self::InsufficientMemory { .. } => PreflightCheck::Memory,
        }
    }
}

/// Minimum machine capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightRequirements {
    pub min_disk_bytes: u64,
    pub min_cpu_mhz: u64,
    /// 0 disables the memory check.
    pub min_physical_ram_bytes: u64,
    /// Treat an unreadable CPU speed (0) as passing.
    pub allow_unknown_cpu_speed: bool,
}

impl PreflightRequirements {
    /// Storage and CPU requirements only.
    pub fn new(min_cpu_mhz: u64, min_disk_bytes: u64) -> Self {
        Self {
            min_disk_bytes,
            min_cpu_mhz,
            min_physical_ram_bytes: 0,
            allow_unknown_cpu_speed: true,
        }
    }
}

/// What the probe saw on a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreflightReport {
    pub available_disk_bytes: u64,
    pub cpu_mhz: u64,
    pub physical_memory_bytes: u64,
}

fn working_drive() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn storage_shortfall(probe: &dyn SystemProbe, required_bytes: u64) -> Result<u64, u64> {
    let Some(space) = probe.disk_space(&working_drive()) else {
        warn!("Could not determine free disk space on the working drive");
        return Err(0);
    };
    let cluster = space.bytes_per_cluster.max(1);
    let needed_clusters = required_bytes / cluster;
    if space.available_clusters < needed_clusters {
        Err(space.available_bytes())
    } else {
        Ok(space.available_bytes())
    }
}

/// True if the working drive has at least `required_bytes` free, compared in clusters.
pub fn check_storage(probe: &dyn SystemProbe, required_bytes: u64) -> bool {
    storage_shortfall(probe, required_bytes).is_ok()
}

/// Nominal CPU speed in MHz, 0 when unknown.
pub fn read_cpu_speed_mhz(probe: &dyn SystemProbe) -> u64 {
    probe.cpu_speed_mhz()
}

/// Run storage, then CPU, then memory checks, stopping at the first failure.
pub fn validate(
    probe: &dyn SystemProbe,
    requirements: &PreflightRequirements,
) -> Result<PreflightReport, PreflightError> {
    let available_disk_bytes = storage_shortfall(probe, requirements.min_disk_bytes).map_err(
        |available_bytes| PreflightError::InsufficientStorage {
            required_bytes: requirements.min_disk_bytes,
            available_bytes,
        },
    )?;

    let cpu_mhz = read_cpu_speed_mhz(probe);
    if cpu_mhz == 0 && requirements.allow_unknown_cpu_speed {
        warn!("CPU speed unavailable; skipping the CPU check");
    } else if cpu_mhz < requirements.min_cpu_mhz {
        return Err(PreflightError::CpuTooSlow {
            required_mhz: requirements.min_cpu_mhz,
            detected_mhz: cpu_mhz,
        });
    }

    let physical_memory_bytes = probe.physical_memory_bytes();
    if requirements.min_physical_ram_bytes > 0
        && physical_memory_bytes < requirements.min_physical_ram_bytes
    {
        return Err(PreflightError::InsufficientMemory {
            required_bytes: requirements.min_physical_ram_bytes,
            available_bytes: physical_memory_bytes,
        });
    }

    debug!(available_disk_bytes, cpu_mhz, physical_memory_bytes, "Preflight probe");
    info!("Preflight checks passed");
    Ok(PreflightReport {
        available_disk_bytes,
        cpu_mhz,
        physical_memory_bytes,
    })
}
