//! Platform services used before and around application startup.
//!
//! - [`instance`]: single-instance enforcement with focus hand-off.
//! - [`preflight`]: disk, CPU and memory precondition checks.
//! - [`paths`]: per-game OS directories.

pub mod error;
pub mod instance;
pub mod paths;
pub mod preflight;

pub use error::PlatformError;
pub use instance::{ExistingWindow, InstanceToken, NoWindowLocator, WindowLocator, acquire_singleton};
pub use paths::PlatformDirs;
pub use preflight::{
    DiskSpace, PreflightCheck, PreflightError, PreflightReport, PreflightRequirements,
    SysinfoProbe, SystemProbe, check_storage, read_cpu_speed_mhz, validate,
};
