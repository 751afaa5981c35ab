//! Flashing the window while it is minimized.
//!
//! [`FlashWhileMinimized`] is a state machine a host can feed from its own
//! timer and restore notifications. [`run_until_restored`] drives it for hosts
//! that only offer a message pump.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::collaborators::AppWindow;

/// Time between attention toggles.
pub const FLASH_INTERVAL: Duration = Duration::from_millis(1000);

/// System commands a window can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCommand {
    Close,
    Minimize,
    Restore,
    Maximize,
}

/// A message from the host's window message queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowMessage {
    SystemCommand(SystemCommand),
    Activate(bool),
    Paint,
    Other(u32),
}

/// What to do with a message that arrived while flashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Forward,
    Discard,
}

/// What to do with the window's attention indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashAction {
    None,
    Flash,
    Clear,
}

pub fn apply(window: &mut dyn AppWindow, action: FlashAction) {
    match action {
        FlashAction::None => {}
        FlashAction::Flash => window.request_attention(true),
        FlashAction::Clear => window.request_attention(false),
    }
}

#[derive(Debug, Clone)]
pub struct FlashWhileMinimized {
    interval: Duration,
    last_toggle: Duration,
    active: bool,
    toggles: u32,
}

impl Default for FlashWhileMinimized {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashWhileMinimized {
    pub fn new() -> Self {
        Self::with_interval(FLASH_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last_toggle: Duration::ZERO,
            active: false,
            toggles: 0,
        }
    }

    /// The window was found minimized at `now`.
    pub fn begin(&mut self, now: Duration) -> FlashAction {
        self.active = true;
        self.last_toggle = now;
        self.toggles = 0;
        FlashAction::Flash
    }

    /// A close command cannot be honored while minimized; everything else is forwarded.
    pub fn filter(&self, message: &WindowMessage) -> Dispatch {
        match message {
            WindowMessage::SystemCommand(SystemCommand::Close) if self.active => Dispatch::Discard,
            _ => Dispatch::Forward,
        }
    }

    /// Timer tick. Flashes once per elapsed interval.
    pub fn on_timer(&mut self, now: Duration) -> FlashAction {
        if !self.active || now.saturating_sub(self.last_toggle) < self.interval {
            return FlashAction::None;
        }
        self.last_toggle = now;
        self.toggles += 1;
        FlashAction::Flash
    }

    /// The window is no longer minimized.
    pub fn on_restored(&mut self) -> FlashAction {
        self.active = false;
        FlashAction::Clear
    }

    /// How long until the next toggle is due.
    pub fn time_until_next(&self, now: Duration) -> Duration {
        (self.last_toggle + self.interval).saturating_sub(now)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Timer-driven flashes since [`begin`](Self::begin).
    pub fn toggles(&self) -> u32 {
        self.toggles
    }
}

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// [`Clock`] over [`Instant`], counting from its creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// The host's window message queue.
pub trait MessagePump {
    /// Remove and return the next pending message, if any.
    fn next_message(&mut self) -> Option<WindowMessage>;
    /// Hand a message to the window's normal handling.
    fn dispatch(&mut self, message: WindowMessage, window: &mut dyn AppWindow);
    /// Block until a message arrives or `timeout` elapses.
    fn wait(&mut self, timeout: Duration);
}

/// Summary of one flashing session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlashReport {
    /// False when the window was not minimized on entry.
    pub entered: bool,
    pub toggles: u32,
    pub discarded: u32,
}

/// Flash `window` until it is restored, forwarding messages meanwhile.
///
/// Returns immediately if the window is not minimized.
pub fn run_until_restored(
    window: &mut dyn AppWindow,
    pump: &mut dyn MessagePump,
    clock: &dyn Clock,
) -> FlashReport {
    if !window.is_minimized() {
        return FlashReport::default();
    }

    let mut machine = FlashWhileMinimized::new();
    let mut discarded = 0;
    apply(window, machine.begin(clock.now()));
    debug!(title = window.title(), "Flashing minimized window");

    loop {
        if let Some(message) = pump.next_message() {
            match machine.filter(&message) {
                Dispatch::Forward => pump.dispatch(message, window),
                Dispatch::Discard => {
                    discarded += 1;
                    debug!("Ignoring close while minimized");
                }
            }
        } else {
            let now = clock.now();
            apply(window, machine.on_timer(now));
            if window.is_minimized() {
                pump.wait(machine.time_until_next(now));
            }
        }

        if !window.is_minimized() {
            apply(window, machine.on_restored());
            break;
        }
    }

    FlashReport {
        entered: true,
        toggles: machine.toggles(),
        discarded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    struct FakeClock(Rc<Cell<Duration>>);

    impl Clock for FakeClock {
        fn now(&self) -> Duration {
            self.0.get()
        }
    }

    #[derive(Default)]
    struct FakeWindow {
        minimized: bool,
        closed: bool,
        attention: Vec<bool>,
    }

    impl AppWindow for FakeWindow {
        fn title(&self) -> &str {
            "fake"
        }
        fn set_title(&mut self, _title: &str) {}
        fn inner_size(&self) -> (u32, u32) {
            (640, 480)
        }
        fn is_minimized(&self) -> bool {
            self.minimized
        }
        fn set_minimized(&mut self, minimized: bool) {
            self.minimized = minimized;
        }
        fn request_attention(&mut self, on: bool) {
            self.attention.push(on);
        }
        fn close(&mut self) {
            self.closed = true;
        }
    }

    /// Delivers scripted messages at fixed times; waiting advances the clock.
    struct ScriptedPump {
        clock: Rc<Cell<Duration>>,
        script: VecDeque<(Duration, WindowMessage)>,
        dispatched: Vec<WindowMessage>,
    }

    impl MessagePump for ScriptedPump {
        fn next_message(&mut self) -> Option<WindowMessage> {
            match self.script.front() {
                Some((at, _)) if *at <= self.clock.get() => self.script.pop_front().map(|(_, m)| m),
                _ => None,
            }
        }

        fn dispatch(&mut self, message: WindowMessage, window: &mut dyn AppWindow) {
            match message {
                WindowMessage::SystemCommand(SystemCommand::Close) => window.close(),
                WindowMessage::SystemCommand(SystemCommand::Restore) => window.set_minimized(false),
                _ => {}
            }
            self.dispatched.push(message);
        }

        fn wait(&mut self, timeout: Duration) {
            let deadline = self.clock.get() + timeout;
            let next = self.script.front().map_or(deadline, |(at, _)| (*at).min(deadline));
            self.clock.set(next.max(self.clock.get()));
        }
    }

    #[test]
    fn test_restored_after_2500ms_flashes_twice_and_ignores_close() {
        let time = Rc::new(Cell::new(Duration::ZERO));
        let mut window = FakeWindow {
            minimized: true,
            ..Default::default()
        };
        let mut pump = ScriptedPump {
            clock: Rc::clone(&time),
            script: VecDeque::from([
                (ms(500), WindowMessage::SystemCommand(SystemCommand::Close)),
                (ms(800), WindowMessage::Paint),
                (ms(2500), WindowMessage::SystemCommand(SystemCommand::Restore)),
            ]),
            dispatched: Vec::new(),
        };

        let report = run_until_restored(&mut window, &mut pump, &FakeClock(Rc::clone(&time)));

        assert!(report.entered);
        assert!(report.toggles >= 2);
        assert_eq!(report.discarded, 1);
        assert!(!window.closed);
        assert!(!window.minimized);
        assert_eq!(time.get(), ms(2500));
        // Initial flash, one per elapsed second, cleared on restore.
        assert_eq!(window.attention, vec![true, true, true, false]);
        assert_eq!(
            pump.dispatched,
            vec![
                WindowMessage::Paint,
                WindowMessage::SystemCommand(SystemCommand::Restore)
            ]
        );
    }

    #[test]
    fn test_not_minimized_is_skipped() {
        let time = Rc::new(Cell::new(Duration::ZERO));
        let mut window = FakeWindow::default();
        let mut pump = ScriptedPump {
            clock: Rc::clone(&time),
            script: VecDeque::new(),
            dispatched: Vec::new(),
        };

        let report = run_until_restored(&mut window, &mut pump, &FakeClock(time));
        assert_eq!(report, FlashReport::default());
        assert!(window.attention.is_empty());
    }

    #[test]
    fn test_state_machine_toggles_per_interval() {
        let mut machine = FlashWhileMinimized::new();
        assert_eq!(machine.begin(ms(0)), FlashAction::Flash);
        assert_eq!(machine.on_timer(ms(999)), FlashAction::None);
        assert_eq!(machine.on_timer(ms(1000)), FlashAction::Flash);
        assert_eq!(machine.on_timer(ms(1500)), FlashAction::None);
        assert_eq!(machine.time_until_next(ms(1500)), ms(500));
        assert_eq!(machine.on_timer(ms(2000)), FlashAction::Flash);
        assert_eq!(machine.toggles(), 2);

        assert_eq!(
            machine.filter(&WindowMessage::SystemCommand(SystemCommand::Close)),
            Dispatch::Discard
        );
        assert_eq!(machine.filter(&WindowMessage::Paint), Dispatch::Forward);

        assert_eq!(machine.on_restored(), FlashAction::Clear);
        assert_eq!(machine.on_timer(ms(5000)), FlashAction::None);
        assert_eq!(
            machine.filter(&WindowMessage::SystemCommand(SystemCommand::Close)),
            Dispatch::Forward
        );
    }
}
