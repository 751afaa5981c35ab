//! Application error types and error reporting.

use std::fmt;

use gamecode_platform::{PlatformError, PreflightError};
use thiserror::Error;
use tracing::error;

use crate::orchestrator::LifecycleState;

/// Boxed source error from a collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A startup step of [`Application::initialize`](crate::Application::initialize).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStep {
    ResourceCache,
    Localization,
    ScriptEngine,
    PreinitScript,
    ScriptBindings,
    Window,
    RenderDevice,
    SaveDirectory,
    Game,
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResourceCache => "resource cache",
            Self::Localization => "localized strings",
            Self::ScriptEngine => "script engine",
            Self::PreinitScript => "pre-init script",
            Self::ScriptBindings => "script bindings",
            Self::Window => "window",
            Self::RenderDevice => "render device",
            Self::SaveDirectory => "save game directory",
            Self::Game => "game logic and views",
        };
        f.write_str(name)
    }
}

/// A startup precondition was not met. Nothing has been constructed yet.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error("another instance of {title} is already running")]
    DuplicateInstance { title: String },

    #[error("could not take the single-instance lock: {0}")]
    InstanceLock(#[source] PlatformError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("startup precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("failed to initialize {step}: {source}")]
    SubsystemInit {
        step: InitStep,
        #[source]
        source: BoxError,
    },

    #[error("invalid lifecycle state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        expected: LifecycleState,
        actual: LifecycleState,
    },
}

impl AppError {
    pub(crate) fn init(step: InitStep, source: impl Into<BoxError>) -> Self {
        Self::SubsystemInit {
            step,
            source: source.into(),
        }
    }

    /// Process exit code for a failed startup. A denied duplicate launch exits cleanly.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Precondition(PreconditionError::DuplicateInstance { .. }) => 0,
            _ => 1,
        }
    }
}

/// How serious a reported error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSeverity {
    /// Logged; the caller continues or unwinds on its own.
    Advisory,
    /// Startup cannot continue.
    Fatal,
}

/// Sink for errors the orchestrator surfaces to the user.
pub trait ErrorReporter {
    fn report(&self, error: &AppError, severity: ReportSeverity);
}

/// What [`TracingReporter`] does with a [`ReportSeverity::Fatal`] report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportPolicy {
    /// Log it and return to the caller.
    #[default]
    Advisory,
    /// Log it and exit the process with code 1.
    Fatal,
}

/// Reports through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter {
    policy: ReportPolicy,
}

impl TracingReporter {
    pub fn new(policy: ReportPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ReportPolicy {
        self.policy
    }
}

impl ErrorReporter for TracingReporter {
    fn report(&self, err: &AppError, severity: ReportSeverity) {
        error!(error = %err, ?severity, "Application error");
        if severity == ReportSeverity::Fatal && self.policy == ReportPolicy::Fatal {
            std::process::exit(1);
        }
    }
}
