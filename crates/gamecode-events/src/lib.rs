//! Lifecycle event bus for the GameCode application host.
//!
//! Events are plain Rust types. Listeners subscribe per type and receive
//! events either immediately ([`EventBus::trigger`]) or on the owner's next
//! [`EventBus::update`] ([`EventBus::queue`]). A bus created in cross-thread
//! mode also accepts events from other threads through [`EventSender`].

pub mod bus;

pub use bus::{EventBus, EventError, EventSender, ListenerId};
