//! Application lifecycle: ordered startup, the run loop hand-off and teardown.
//!
//! Startup runs a fixed sequence and stops at the first failure:
//!
//! 1. preflight checks (disk, CPU, memory)
//! 2. single-instance guard
//! 3. resource cache and loaders
//! 4. localized strings
//! 5. script engine, pre-init script, script bindings
//! 6. event bus
//! 7. window and render device
//! 8. save game directory
//! 9. game logic and views
//! 10. resource preloading
//!
//! A failed startup does not release what it already built; those subsystems
//! stay owned by the [`Application`] until [`Application::close`] or drop.
//! Teardown always runs in the same order: game, render device and window,
//! network forwarder, socket manager, event bus, script bindings, script
//! engine, resource cache.
//!
//! There is no separate quitting flag: a requested quit is the
//! [`LifecycleState::ClosingRequested`] state, mirrored by an atomic flag the
//! frame loop and the [`QuitRequested`] listener share.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gamecode_config::Config;
use gamecode_events::EventBus;
use gamecode_platform::{
    InstanceToken, PlatformDirs, PlatformError, PreflightRequirements, acquire_singleton,
    validate,
};
use gamecode_resource::{
    DevelopmentResourceFile, ResCache, ResourceError, ResourceFile, ResourceLoader,
    XmlResourceLoader, ZipResourceFile,
};
use tracing::{debug, info, warn};

use crate::collaborators::{
    AppWindow, Collaborators, FrameHandler, GameLogic, LoopControl, NetworkEventForwarder,
    RenderDevice, ScriptEngine, SocketManager, WindowDesc,
};
use crate::error::{AppError, BoxError, InitStep, PreconditionError, ReportSeverity};
use crate::flash::{Clock, FlashReport, MessagePump, run_until_restored};
use crate::localization::LocalizationTable;
use crate::subsystem::Subsystem;

/// Name of the application's event bus.
pub const EVENT_BUS_NAME: &str = "GameCode Event Mgr";

/// Time each frame may spend delivering queued events.
pub const EVENT_BUDGET: Duration = Duration::from_millis(20);

/// Published once every startup step has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInitialized {
    pub title: String,
}

/// Publish to ask the application to leave its run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuitRequested;

/// Published at the start of teardown, while the bus still exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppClosing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Initializing,
    Running,
    ClosingRequested,
    Closed,
    Failed,
}

/// The services the application exposes to game code.
pub struct AppContext<'a> {
    pub config: &'a Config,
    pub cache: &'a mut ResCache,
    pub events: &'a EventBus,
    pub strings: &'a LocalizationTable,
    pub save_dir: &'a Path,
}

/// The game-specific half of the application.
pub trait GameHooks {
    /// Window title; also names the single-instance lock.
    fn title(&self) -> &str;

    /// Directory name used for the game's OS directories.
    fn app_directory(&self) -> &str;

    /// Loaders registered after the built-in ones, least specific first.
    fn resource_loaders(&self) -> Vec<Arc<dyn ResourceLoader>> {
        Vec::new()
    }

    /// Preload patterns in addition to the configured ones.
    fn preload_patterns(&self) -> Vec<String> {
        Vec::new()
    }

    /// Subscribe game listeners once the event bus exists.
    fn register_events(&mut self, _events: &EventBus) {}

    fn create_game_and_view(
        &mut self,
        ctx: &mut AppContext<'_>,
    ) -> Result<Box<dyn GameLogic>, BoxError>;
}

/// Resolve and create the game's OS directories, named after
/// [`GameHooks::app_directory`]. `root` replaces the OS base directories.
pub fn resolve_game_dirs(
    hooks: &dyn GameHooks,
    root: Option<&Path>,
) -> Result<PlatformDirs, PlatformError> {
    let app_directory = hooks.app_directory();
    match root {
        Some(root) => {
            let dirs = PlatformDirs::resolve_with_root(root, app_directory);
            dirs.create_dirs()?;
            Ok(dirs)
        }
        None => PlatformDirs::resolve_and_create(app_directory),
    }
}

pub struct Application {
    state: LifecycleState,
    // Slots in teardown order.
    game: Subsystem<Box<dyn GameLogic>>,
    device: Subsystem<Box<dyn RenderDevice>>,
    window: Subsystem<Box<dyn AppWindow>>,
    network_forwarder: Subsystem<Box<dyn NetworkEventForwarder>>,
    socket_manager: Subsystem<Box<dyn SocketManager>>,
    event_bus: Subsystem<EventBus>,
    script_bindings: bool,
    script_engine: Subsystem<Box<dyn ScriptEngine>>,
    cache: Subsystem<ResCache>,
    strings: Option<LocalizationTable>,
    instance: Option<InstanceToken>,
    quit: Arc<AtomicBool>,
    modal_depth: u32,
    exit_code: Option<i32>,
    config: Config,
    dirs: PlatformDirs,
    hooks: Box<dyn GameHooks>,
    collaborators: Collaborators,
}

impl Application {
    pub fn new(
        config: Config,
        dirs: PlatformDirs,
        hooks: Box<dyn GameHooks>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            state: LifecycleState::Constructed,
            game: Subsystem::new("game"),
            device: Subsystem::new("render device"),
            window: Subsystem::new("window"),
            network_forwarder: Subsystem::new("network event forwarder"),
            socket_manager: Subsystem::new("socket manager"),
            event_bus: Subsystem::new("event bus"),
            script_bindings: false,
            script_engine: Subsystem::new("script engine"),
            cache: Subsystem::new("resource cache"),
            strings: None,
            instance: None,
            quit: Arc::new(AtomicBool::new(false)),
            modal_depth: 0,
            exit_code: None,
            config,
            dirs,
            hooks,
            collaborators,
        }
    }

    fn expect_state(&self, expected: LifecycleState) -> Result<(), AppError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AppError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    /// Run every startup step. On success the application is running.
    pub fn initialize(&mut self) -> Result<(), AppError> {
        self.expect_state(LifecycleState::Constructed)?;
        self.state = LifecycleState::Initializing;
        info!(title = self.hooks.title(), "Initializing application");

        match self.startup() {
            Ok(()) => {
                self.state = LifecycleState::Running;
                let title = self.hooks.title().to_string();
                info!(title = %title, "Application running");
                self.publish(AppInitialized { title });
                Ok(())
            }
            Err(e) => {
                self.state = LifecycleState::Failed;
                if let AppError::Precondition(PreconditionError::DuplicateInstance { title }) = &e {
                    info!(title = %title, "Exiting in favour of the running instance");
                } else {
                    self.collaborators
                        .reporter
                        .report(&e, ReportSeverity::Fatal);
                }
                Err(e)
            }
        }
    }

    fn startup(&mut self) -> Result<(), AppError> {
        self.check_preconditions()?;
        self.init_cache()?;
        self.init_strings()?;
        self.init_scripting()?;
        self.init_event_bus();
        self.init_window()?;
        self.init_save_directory()?;
        self.init_game()?;
        self.preload();
        Ok(())
    }

    fn check_preconditions(&mut self) -> Result<(), AppError> {
        let startup = &self.config.startup;
        let requirements = PreflightRequirements {
            min_disk_bytes: startup.min_disk_bytes,
            min_cpu_mhz: startup.min_cpu_mhz,
            min_physical_ram_bytes: startup.min_physical_ram_bytes,
            allow_unknown_cpu_speed: startup.allow_unknown_cpu_speed,
        };
        validate(self.collaborators.probe.as_ref(), &requirements)
            .map_err(PreconditionError::from)?;

        if !startup.single_instance {
            debug!("Single-instance guard disabled");
            return Ok(());
        }
        let title = self.hooks.title();
        let token = acquire_singleton(
            &self.dirs.cache_dir,
            title,
            self.collaborators.window_locator.as_ref(),
        )
        .map_err(PreconditionError::InstanceLock)?;
        match token {
            Some(token) => {
                self.instance = Some(token);
                Ok(())
            }
            None => Err(PreconditionError::DuplicateInstance {
                title: title.to_string(),
            }
            .into()),
        }
    }

    fn default_resource_file(&self) -> Box<dyn ResourceFile> {
        let resources = &self.config.resources;
        if resources.use_development_directories {
            Box::new(DevelopmentResourceFile::new(&resources.asset_directory))
        } else {
            Box::new(ZipResourceFile::new(&resources.archive))
        }
    }

    fn init_cache(&mut self) -> Result<(), AppError> {
        let file = match self.collaborators.resource_file.take() {
            Some(file) => file,
            None => self.default_resource_file(),
        };
        let capacity = self.config.cache_capacity_bytes();
        let cache = self
            .cache
            .init_with(|| {
                let mut cache = ResCache::with_capacity_bytes(capacity, file);
                cache.init().map(|()| cache)
            })
            .map_err(|e| AppError::init(InitStep::ResourceCache, e))?;

        cache.register_loader(Arc::new(XmlResourceLoader));
        for loader in self.hooks.resource_loaders() {
            cache.register_loader(loader);
        }
        Ok(())
    }

    fn init_strings(&mut self) -> Result<(), AppError> {
        let cache = self
            .cache
            .get_mut()
            .ok_or_else(|| AppError::init(InitStep::Localization, "resource cache missing"))?;
        let table = LocalizationTable::load(cache, &self.config.localization.language)
            .map_err(|e| AppError::init(InitStep::Localization, e))?;
        self.strings = Some(table);
        Ok(())
    }

    fn init_scripting(&mut self) -> Result<(), AppError> {
        let factory = &mut self.collaborators.script_factory;
        let engine = self
            .script_engine
            .init_with(|| factory.create())
            .map_err(|e| AppError::init(InitStep::ScriptEngine, e))?;

        let preinit = &self.config.scripting.preinit_script;
        if let Some(cache) = self.cache.get_mut()
            && !preinit.is_empty()
        {
            match cache.get_handle(preinit) {
                Ok(handle) => engine
                    .execute(handle.name(), handle.buffer())
                    .map_err(|e| AppError::init(InitStep::PreinitScript, e))?,
                Err(ResourceError::NotFound(name)) => {
                    warn!(script = %name, "Pre-init script not found, continuing");
                }
                Err(e) => return Err(AppError::init(InitStep::PreinitScript, e)),
            }
        }

        engine
            .register_bindings()
            .map_err(|e| AppError::init(InitStep::ScriptBindings, e))?;
        self.script_bindings = true;
        Ok(())
    }

    fn init_event_bus(&mut self) {
        let bus = EventBus::new(EVENT_BUS_NAME, true);
        let quit = Arc::clone(&self.quit);
        bus.subscribe(move |_: &QuitRequested| quit.store(true, Ordering::SeqCst));
        self.hooks.register_events(&bus);
        self.event_bus.install(bus);
    }

    fn init_window(&mut self) -> Result<(), AppError> {
        let title = self.hooks.title().to_string();
        let desc = WindowDesc {
            title: title.clone(),
            width: self.config.window.width,
            height: self.config.window.height,
            fullscreen: self.config.window.fullscreen,
        };
        let window_system = &mut self.collaborators.window_system;
        let window = self
            .window
            .init_with(|| window_system.create_window(&desc))
            .map_err(|e| AppError::init(InitStep::Window, e))?;
        window.set_title(&title);

        let (width, height) = window.inner_size();
        let factory = &mut self.collaborators.device_factory;
        let window: &dyn AppWindow = &**window;
        let device = self
            .device
            .init_with(|| factory.create_device(window, width, height))
            .map_err(|e| AppError::init(InitStep::RenderDevice, e))?;
        device
            .on_restore()
            .map_err(|e| AppError::init(InitStep::RenderDevice, e))?;
        info!(device = device.name(), width, height, "Window and render device created");
        Ok(())
    }

    fn init_save_directory(&mut self) -> Result<(), AppError> {
        std::fs::create_dir_all(&self.dirs.save_dir)
            .map_err(|e| AppError::init(InitStep::SaveDirectory, e))?;
        debug!(path = %self.dirs.save_dir.display(), "Save game directory ready");
        Ok(())
    }

    fn init_game(&mut self) -> Result<(), AppError> {
        let (Some(cache), Some(events), Some(strings)) = (
            self.cache.get_mut(),
            self.event_bus.get(),
            self.strings.as_ref(),
        ) else {
            return Err(AppError::init(InitStep::Game, "core subsystems missing"));
        };
        let mut ctx = AppContext {
            config: &self.config,
            cache,
            events,
            strings,
            save_dir: &self.dirs.save_dir,
        };
        let game = self
            .hooks
            .create_game_and_view(&mut ctx)
            .map_err(|e| AppError::init(InitStep::Game, e))?;
        self.game.install(game);
        Ok(())
    }

    fn preload(&mut self) {
        let Some(cache) = self.cache.get_mut() else {
            return;
        };
        let patterns = self
            .config
            .resources
            .preload
            .iter()
            .cloned()
            .chain(self.hooks.preload_patterns());
        for pattern in patterns {
            cache.preload(&pattern, None);
        }
    }

    fn publish<E: std::any::Any + Send>(&self, event: E) {
        if let Some(bus) = self.event_bus.get()
            && let Err(e) = bus.trigger(event)
        {
            warn!(error = %e, "Could not publish lifecycle event");
        }
    }

    /// Hand control to the window system's message loop, then tear down.
    ///
    /// Returns the process exit code. A quit requested before the loop starts
    /// ends it after the first frame.
    pub fn run(&mut self) -> Result<i32, AppError> {
        if self.state != LifecycleState::ClosingRequested {
            self.expect_state(LifecycleState::Running)?;
        }
        let Some(window) = self.window.get_mut() else {
            return Err(AppError::init(InitStep::Window, "window missing"));
        };

        let mut frame = FrameLoop {
            game: &mut self.game,
            events: self.event_bus.get(),
            quit: &self.quit,
        };
        let loop_code = self
            .collaborators
            .window_system
            .run_message_loop(&mut **window, &mut frame);

        if self.state == LifecycleState::Running {
            self.state = LifecycleState::ClosingRequested;
        }
        let code = self.exit_code.unwrap_or(loop_code);
        self.close();
        info!(code, "Application exited");
        Ok(code)
    }

    /// Ask the run loop to stop after the current frame.
    pub fn request_quit(&mut self) {
        if self.state == LifecycleState::Running {
            self.state = LifecycleState::ClosingRequested;
        }
        self.quit.store(true, Ordering::SeqCst);
        self.publish(QuitRequested);
    }

    /// Release every subsystem in teardown order. Returns how many were released.
    ///
    /// Safe to call at any point and more than once.
    pub fn close(&mut self) -> usize {
        if self.state == LifecycleState::Closed {
            debug!("Application already closed");
            return 0;
        }
        if matches!(
            self.state,
            LifecycleState::Running | LifecycleState::ClosingRequested
        ) {
            self.publish(AppClosing);
        }

        let mut released = 0;
        released += usize::from(self.game.destroy_with(|mut game| game.shutdown()));
        released += usize::from(self.device.destroy());
        released += usize::from(self.window.destroy_with(|mut window| window.close()));

        let events = self.event_bus.get();
        released += usize::from(
            self.network_forwarder
                .destroy_with(|mut forwarder| {
                    if let Some(events) = events {
                        forwarder.detach(events);
                    }
                }),
        );
        released += usize::from(self.socket_manager.destroy_with(|mut sockets| sockets.shutdown()));
        released += usize::from(self.event_bus.destroy());

        if self.script_bindings {
            if let Some(engine) = self.script_engine.get_mut() {
                engine.unregister_bindings();
                debug!("Script bindings unregistered");
            }
            self.script_bindings = false;
        }
        released += usize::from(self.script_engine.destroy());
        released += usize::from(self.cache.destroy_with(|mut cache| cache.flush()));
        self.strings = None;

        if self.state != LifecycleState::Failed {
            self.state = LifecycleState::Closed;
        }
        info!(released, "Application closed");
        released
    }

    /// Take ownership of the networking subsystems. Requires a running application.
    pub fn attach_network(
        &mut self,
        sockets: Box<dyn SocketManager>,
        mut forwarder: Box<dyn NetworkEventForwarder>,
    ) -> Result<(), AppError> {
        self.expect_state(LifecycleState::Running)?;
        if let Some(events) = self.event_bus.get() {
            forwarder.attach(events);
        }
        self.socket_manager.install(sockets);
        self.network_forwarder.install(forwarder);
        Ok(())
    }

    /// Flash the window until the user restores it. Skipped while a modal dialog is up.
    pub fn flash_while_minimized(
        &mut self,
        pump: &mut dyn MessagePump,
        clock: &dyn Clock,
    ) -> FlashReport {
        if self.has_modal_dialog() {
            return FlashReport::default();
        }
        match self.window.get_mut() {
            Some(window) => run_until_restored(&mut **window, pump, clock),
            None => FlashReport::default(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    pub fn push_modal(&mut self) {
        self.modal_depth += 1;
    }

    pub fn pop_modal(&mut self) {
        self.modal_depth = self.modal_depth.saturating_sub(1);
    }

    pub fn has_modal_dialog(&self) -> bool {
        self.modal_depth > 0
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn set_exit_code(&mut self, code: i32) {
        self.exit_code = Some(code);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn strings(&self) -> Option<&LocalizationTable> {
        self.strings.as_ref()
    }

    pub fn events(&self) -> Option<&EventBus> {
        self.event_bus.get()
    }

    pub fn cache_mut(&mut self) -> Option<&mut ResCache> {
        self.cache.get_mut()
    }

    pub fn instance_token(&self) -> Option<&InstanceToken> {
        self.instance.as_ref()
    }

    /// Services for game code, once startup has built them.
    pub fn context(&mut self) -> Option<AppContext<'_>> {
        Some(AppContext {
            config: &self.config,
            cache: self.cache.get_mut()?,
            events: self.event_bus.get()?,
            strings: self.strings.as_ref()?,
            save_dir: &self.dirs.save_dir,
        })
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.close();
    }
}

struct FrameLoop<'a> {
    game: &'a mut Subsystem<Box<dyn GameLogic>>,
    events: Option<&'a EventBus>,
    quit: &'a AtomicBool,
}

impl FrameHandler for FrameLoop<'_> {
    fn on_frame(&mut self, elapsed: Duration) -> LoopControl {
        if let Some(events) = self.events {
            if let Err(e) = events.update(EVENT_BUDGET) {
                warn!(error = %e, "Event update failed");
            }
            if let Some(game) = self.game.get_mut() {
                game.update(elapsed, events);
            }
        }
        if self.quit.load(Ordering::SeqCst) {
            LoopControl::Exit
        } else {
            LoopControl::Continue
        }
    }

    fn on_close_requested(&mut self) {
        self.quit.store(true, Ordering::SeqCst);
        if let Some(events) = self.events
            && let Err(e) = events.trigger(QuitRequested)
        {
            warn!(error = %e, "Could not publish quit request");
        }
    }
}
