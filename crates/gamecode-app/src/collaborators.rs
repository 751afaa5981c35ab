//! Surfaces of the external systems the orchestrator drives but does not own
//! the implementation of: windowing, rendering, scripting and networking.

use std::time::Duration;

use gamecode_events::EventBus;
use gamecode_platform::{SystemProbe, WindowLocator};
use gamecode_resource::ResourceFile;

use crate::error::{BoxError, ErrorReporter};

/// Parameters for the main window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDesc {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

/// The application's top-level window.
pub trait AppWindow {
    fn title(&self) -> &str;
    fn set_title(&mut self, title: &str);
    fn inner_size(&self) -> (u32, u32);
    fn is_minimized(&self) -> bool;
    fn set_minimized(&mut self, minimized: bool);
    /// Start (`true`) or stop (`false`) drawing the user's attention, e.g. a taskbar flash.
    fn request_attention(&mut self, on: bool);
    fn close(&mut self);
}

/// What the host loop should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// Callbacks the windowing system's message loop makes into the application.
pub trait FrameHandler {
    /// One iteration of the loop, `elapsed` after the previous one.
    fn on_frame(&mut self, elapsed: Duration) -> LoopControl;
    /// The user asked to close the window.
    fn on_close_requested(&mut self);
}

/// Window creation and the message loop.
pub trait WindowSystem {
    fn create_window(&mut self, desc: &WindowDesc) -> Result<Box<dyn AppWindow>, BoxError>;

    /// Pump messages and call `handler` until it returns [`LoopControl::Exit`].
    /// Returns the loop's exit code.
    fn run_message_loop(
        &mut self,
        window: &mut dyn AppWindow,
        handler: &mut dyn FrameHandler,
    ) -> i32;
}

/// The rendering device bound to the main window.
pub trait RenderDevice {
    fn name(&self) -> &str;
    /// Recreate size-dependent resources after creation or a device reset.
    fn on_restore(&mut self) -> Result<(), BoxError>;
}

pub trait DeviceFactory {
    fn create_device(
        &mut self,
        window: &dyn AppWindow,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn RenderDevice>, BoxError>;
}

/// A scripting language runtime.
pub trait ScriptEngine {
    /// Execute a script resource.
    fn execute(&mut self, name: &str, source: &[u8]) -> Result<(), BoxError>;
    /// Expose the host's functions to scripts.
    fn register_bindings(&mut self) -> Result<(), BoxError>;
    fn unregister_bindings(&mut self);
}

pub trait ScriptEngineFactory {
    fn create(&mut self) -> Result<Box<dyn ScriptEngine>, BoxError>;
}

/// Owner of the game's network sockets.
pub trait SocketManager {
    fn shutdown(&mut self);
}

/// Relays events between the local bus and remote peers.
pub trait NetworkEventForwarder {
    /// Subscribe to the events that should go over the wire.
    fn attach(&mut self, events: &EventBus);
    /// Remove every subscription made by [`attach`](Self::attach).
    fn detach(&mut self, events: &EventBus);
}

/// Game-specific logic and views.
pub trait GameLogic {
    fn update(&mut self, elapsed: Duration, events: &EventBus);
    fn shutdown(&mut self) {}
}

/// Everything the orchestrator needs from the host environment.
pub struct Collaborators {
    pub probe: Box<dyn SystemProbe>,
    pub window_locator: Box<dyn WindowLocator>,
    pub window_system: Box<dyn WindowSystem>,
    pub device_factory: Box<dyn DeviceFactory>,
    pub script_factory: Box<dyn ScriptEngineFactory>,
    pub reporter: Box<dyn ErrorReporter>,
    /// Backing store for the cache. When `None` it is built from the resource config.
    pub resource_file: Option<Box<dyn ResourceFile>>,
}
