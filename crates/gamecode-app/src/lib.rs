//! GameCode application host: the lifecycle orchestrator and the pieces it
//! wires together.
//!
//! [`Application`] runs startup in a fixed fail-fast order (preflight checks,
//! single-instance guard, resource cache, localized strings, scripting, event
//! bus, window and device, save directory, game, preloading), hands control to
//! the window system's message loop and tears everything down in a fixed
//! order afterwards.

pub mod collaborators;
pub mod error;
pub mod flash;
pub mod headless;
pub mod localization;
pub mod orchestrator;
pub mod subsystem;

pub use collaborators::{
    AppWindow, Collaborators, DeviceFactory, FrameHandler, GameLogic, LoopControl,
    NetworkEventForwarder, RenderDevice, ScriptEngine, ScriptEngineFactory, SocketManager,
    WindowDesc, WindowSystem,
};
pub use error::{
    AppError, BoxError, ErrorReporter, InitStep, PreconditionError, ReportPolicy, ReportSeverity,
    TracingReporter,
};
pub use flash::{
    Clock, Dispatch, FlashAction, FlashReport, FlashWhileMinimized, MessagePump, SystemClock,
    SystemCommand, WindowMessage, run_until_restored,
};
pub use localization::{LocalizationError, LocalizationTable, char_to_key_code};
pub use orchestrator::{
    AppClosing, AppContext, AppInitialized, Application, GameHooks, LifecycleState, QuitRequested,
    resolve_game_dirs,
};
pub use subsystem::{Subsystem, SubsystemState};
