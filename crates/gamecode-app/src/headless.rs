//! Collaborators for running without a display, GPU or script runtime:
//! dedicated servers, CI smoke runs and tools.

use std::time::Duration;

use gamecode_config::Config;
use gamecode_events::EventBus;
use gamecode_platform::{NoWindowLocator, SysinfoProbe};
use tracing::{debug, info, trace};

use crate::collaborators::{
    AppWindow, Collaborators, DeviceFactory, FrameHandler, GameLogic, LoopControl, RenderDevice,
    ScriptEngine, ScriptEngineFactory, WindowDesc, WindowSystem,
};
use crate::error::{BoxError, ReportPolicy, TracingReporter};
use crate::orchestrator::{AppContext, GameHooks};

/// Frame time reported to the game by the headless loop.
pub const HEADLESS_FRAME: Duration = Duration::from_millis(16);

/// A window that only remembers its properties.
#[derive(Debug)]
pub struct HeadlessWindow {
    title: String,
    size: (u32, u32),
    minimized: bool,
    attention: bool,
}

impl HeadlessWindow {
    pub fn attention_requested(&self) -> bool {
        self.attention
    }
}

impl AppWindow for HeadlessWindow {
    fn title(&self) -> &str {
        &self.title
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn inner_size(&self) -> (u32, u32) {
        self.size
    }

    fn is_minimized(&self) -> bool {
        self.minimized
    }

    fn set_minimized(&mut self, minimized: bool) {
        self.minimized = minimized;
    }

    fn request_attention(&mut self, on: bool) {
        self.attention = on;
    }

    fn close(&mut self) {
        debug!(title = %self.title, "Headless window closed");
    }
}

/// Runs a fixed number of frames, then asks the application to close.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessWindowSystem {
    frames: u32,
}

impl HeadlessWindowSystem {
    pub fn new(frames: u32) -> Self {
        Self { frames }
    }
}

impl WindowSystem for HeadlessWindowSystem {
    fn create_window(&mut self, desc: &WindowDesc) -> Result<Box<dyn AppWindow>, BoxError> {
        Ok(Box::new(HeadlessWindow {
            title: desc.title.clone(),
            size: (desc.width, desc.height),
            minimized: false,
            attention: false,
        }))
    }

    fn run_message_loop(
        &mut self,
        window: &mut dyn AppWindow,
        handler: &mut dyn FrameHandler,
    ) -> i32 {
        info!(title = window.title(), frames = self.frames, "Headless loop started");
        let mut frame = 0u32;
        loop {
            if frame == self.frames {
                handler.on_close_requested();
            }
            if handler.on_frame(HEADLESS_FRAME) == LoopControl::Exit {
                break;
            }
            frame = frame.saturating_add(1);
        }
        debug!(frames = frame, "Headless loop finished");
        0
    }
}

/// Device that renders nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDevice;

impl RenderDevice for NullDevice {
    fn name(&self) -> &str {
        "null"
    }

    fn on_restore(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullDeviceFactory;

impl DeviceFactory for NullDeviceFactory {
    fn create_device(
        &mut self,
        _window: &dyn AppWindow,
        _width: u32,
        _height: u32,
    ) -> Result<Box<dyn RenderDevice>, BoxError> {
        Ok(Box::new(NullDevice))
    }
}

/// Script engine that accepts every script without running it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScriptEngine;

impl ScriptEngine for NullScriptEngine {
    fn execute(&mut self, name: &str, source: &[u8]) -> Result<(), BoxError> {
        debug!(script = name, bytes = source.len(), "Skipping script in headless mode");
        Ok(())
    }

    fn register_bindings(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn unregister_bindings(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullScriptEngineFactory;

impl ScriptEngineFactory for NullScriptEngineFactory {
    fn create(&mut self) -> Result<Box<dyn ScriptEngine>, BoxError> {
        Ok(Box::new(NullScriptEngine))
    }
}

/// Headless collaborators over the real machine probe.
pub fn collaborators(frames: u32, policy: ReportPolicy) -> Collaborators {
    Collaborators {
        probe: Box::new(SysinfoProbe),
        window_locator: Box::new(NoWindowLocator),
        window_system: Box::new(HeadlessWindowSystem::new(frames)),
        device_factory: Box::new(NullDeviceFactory),
        script_factory: Box::new(NullScriptEngineFactory),
        reporter: Box::new(TracingReporter::new(policy)),
        resource_file: None,
    }
}

/// A game with no logic: it only counts frames.
#[derive(Debug)]
pub struct IdleGame {
    frames: u64,
}

impl GameLogic for IdleGame {
    fn update(&mut self, elapsed: Duration, _events: &EventBus) {
        self.frames += 1;
        trace!(frame = self.frames, ?elapsed, "Idle frame");
    }

    fn shutdown(&mut self) {
        info!(frames = self.frames, "Idle game finished");
    }
}

/// Hooks for running the host on its own, titled from the config.
#[derive(Debug, Clone)]
pub struct IdleGameHooks {
    title: String,
    app_directory: String,
}

impl IdleGameHooks {
    pub fn new(config: &Config, app_directory: &str) -> Self {
        Self {
            title: config.window.title.clone(),
            app_directory: app_directory.to_string(),
        }
    }
}

impl GameHooks for IdleGameHooks {
    fn title(&self) -> &str {
        &self.title
    }

    fn app_directory(&self) -> &str {
        &self.app_directory
    }

    fn create_game_and_view(
        &mut self,
        ctx: &mut AppContext<'_>,
    ) -> Result<Box<dyn GameLogic>, BoxError> {
        info!(
            language = ctx.strings.language(),
            save_dir = %ctx.save_dir.display(),
            "Creating idle game"
        );
        Ok(Box::new(IdleGame { frames: 0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingHandler {
        frames: u32,
        close_requested_at: Option<u32>,
    }

    impl FrameHandler for CountingHandler {
        fn on_frame(&mut self, _elapsed: Duration) -> LoopControl {
            self.frames += 1;
            if self.close_requested_at.is_some() {
                LoopControl::Exit
            } else {
                LoopControl::Continue
            }
        }

        fn on_close_requested(&mut self) {
            self.close_requested_at = Some(self.frames);
        }
    }

    #[test]
    fn test_headless_loop_closes_after_frame_budget() {
        let mut system = HeadlessWindowSystem::new(3);
        let desc = WindowDesc {
            title: "Headless".to_string(),
            width: 320,
            height: 200,
            fullscreen: false,
        };
        let mut window = system.create_window(&desc).unwrap();
        assert_eq!(window.inner_size(), (320, 200));

        let mut handler = CountingHandler {
            frames: 0,
            close_requested_at: None,
        };
        assert_eq!(system.run_message_loop(window.as_mut(), &mut handler), 0);
        assert_eq!(handler.close_requested_at, Some(3));
        assert_eq!(handler.frames, 4);
    }

    #[test]
    fn test_null_collaborators_succeed() {
        let mut scripts = NullScriptEngineFactory;
        let mut engine = scripts.create().unwrap();
        assert!(engine.execute("scripts/preinit.lua", b"--").is_ok());
        assert!(engine.register_bindings().is_ok());

        let window = HeadlessWindow {
            title: "t".to_string(),
            size: (1, 1),
            minimized: false,
            attention: false,
        };
        let mut device = NullDeviceFactory.create_device(&window, 1, 1).unwrap();
        assert_eq!(device.name(), "null");
        assert!(device.on_restore().is_ok());
    }
}
