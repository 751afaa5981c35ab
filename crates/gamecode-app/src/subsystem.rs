//! Scoped ownership slot for one subsystem.

use tracing::{debug, warn};

/// Where a subsystem is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsystemState {
    Uninitialized,
    Initialized,
    Failed,
    Destroyed,
}

/// Owns at most one instance of a subsystem and tracks its state.
///
/// Destruction is idempotent: destroying a slot that was never filled, failed
/// to initialize or was already destroyed does nothing.
pub struct Subsystem<T> {
    name: &'static str,
    state: SubsystemState,
    value: Option<T>,
}

impl<T> Subsystem<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            state: SubsystemState::Uninitialized,
            value: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> SubsystemState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == SubsystemState::Initialized
    }

    /// Run `create` and keep its result. On error the slot is marked failed and stays empty.
    pub fn init_with<E>(&mut self, create: impl FnOnce() -> Result<T, E>) -> Result<&mut T, E> {
        match create() {
            Ok(value) => Ok(self.install(value)),
            Err(e) => {
                warn!(subsystem = self.name, "Subsystem failed to initialize");
                self.state = SubsystemState::Failed;
                Err(e)
            }
        }
    }

    /// Fill the slot with an already constructed value.
    pub fn install(&mut self, value: T) -> &mut T {
        debug!(subsystem = self.name, "Subsystem initialized");
        self.state = SubsystemState::Initialized;
        self.value.insert(value)
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    /// Take the value out for a custom teardown. The slot becomes destroyed.
    pub fn take(&mut self) -> Option<T> {
        let value = self.value.take()?;
        self.state = SubsystemState::Destroyed;
        Some(value)
    }

    /// Drop the value. Returns whether anything was destroyed.
    pub fn destroy(&mut self) -> bool {
        self.destroy_with(drop)
    }

    /// Hand the value to `teardown`. Returns whether anything was destroyed.
    pub fn destroy_with(&mut self, teardown: impl FnOnce(T)) -> bool {
        match self.take() {
            Some(value) => {
                teardown(value);
                debug!(subsystem = self.name, "Subsystem destroyed");
                true
            }
            None => false,
        }
    }
}

impl<T> std::fmt::Debug for Subsystem<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subsystem")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_states() {
        let mut slot: Subsystem<u32> = Subsystem::new("counter");
        assert_eq!(slot.state(), SubsystemState::Uninitialized);

        *slot.init_with(|| Ok::<_, ()>(1)).unwrap() += 1;
        assert_eq!(slot.state(), SubsystemState::Initialized);
        assert_eq!(slot.get(), Some(&2));

        assert!(slot.destroy());
        assert_eq!(slot.state(), SubsystemState::Destroyed);
        assert!(!slot.destroy());
    }

    #[test]
    fn test_failed_init_leaves_nothing_to_destroy() {
        let mut slot: Subsystem<u32> = Subsystem::new("broken");
        assert_eq!(slot.init_with(|| Err("nope")), Err("nope"));
        assert_eq!(slot.state(), SubsystemState::Failed);
        assert!(!slot.destroy());
        assert_eq!(slot.state(), SubsystemState::Failed);
    }

    #[test]
    fn test_never_constructed_destroy_is_noop() {
        let mut slot: Subsystem<String> = Subsystem::new("idle");
        let mut called = false;
        assert!(!slot.destroy_with(|_| called = true));
        assert!(!called);
        assert_eq!(slot.state(), SubsystemState::Uninitialized);
    }
}
