//! Typed publish/subscribe bus with immediate and deferred delivery.

use std::any::{Any, TypeId, type_name};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    /// The bus was called from a thread other than its owner, either without
    /// cross-thread mode or for an owner-only operation such as `update`.
    #[error("event bus {bus} used from a foreign thread")]
    WrongThread { bus: String },

    /// The bus behind an [`EventSender`] has been dropped.
    #[error("event bus is gone")]
    Disconnected,
}

/// Identifies one subscription, for [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&dyn Any) + Send + Sync>;

struct Subscription {
    id: ListenerId,
    type_id: TypeId,
    listener: Listener,
}

struct QueuedEvent {
    type_id: TypeId,
    type_name: &'static str,
    payload: Box<dyn Any + Send>,
}

impl QueuedEvent {
    fn new<E: Any + Send>(event: E) -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: type_name::<E>(),
            payload: Box::new(event),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable handle for publishing into a cross-thread [`EventBus`] from any thread.
///
/// Events sent through one sender are delivered in send order; no order is
/// guaranteed between different senders.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<QueuedEvent>,
}

impl EventSender {
    /// Queue `event` for the bus's next [`update`](EventBus::update).
    pub fn send<E: Any + Send>(&self, event: E) -> Result<(), EventError> {
        self.tx
            .send(QueuedEvent::new(event))
            .map_err(|_| EventError::Disconnected)
    }
}

/// Publish/subscribe hub keyed by event type.
///
/// Listeners are stored behind a mutex and cloned out before dispatch, so a
/// listener may subscribe or unsubscribe while an event is being delivered.
///
/// Listeners only ever run on the owner thread. In cross-thread mode,
/// `trigger` and `queue` from any other thread go through the bus channel and
/// are delivered by the owner's next [`update`](Self::update), so no listener
/// is ever invoked concurrently with itself.
pub struct EventBus {
    name: String,
    cross_thread: bool,
    owner: ThreadId,
    next_id: AtomicU64,
    listeners: Mutex<Vec<Subscription>>,
    queue: Mutex<VecDeque<QueuedEvent>>,
    tx: Option<Sender<QueuedEvent>>,
    rx: Option<Receiver<QueuedEvent>>,
}

impl EventBus {
    /// Create a bus owned by the calling thread.
    ///
    /// With `cross_thread` set, any thread may trigger or queue events and
    /// [`sender`](Self::sender) hands out channel senders.
    pub fn new(name: impl Into<String>, cross_thread: bool) -> Self {
        let name = name.into();
        let (tx, rx) = if cross_thread {
            let (tx, rx) = crossbeam_channel::unbounded();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        info!(bus = %name, cross_thread, "Event bus created");
        Self {
            name,
            cross_thread,
            owner: thread::current().id(),
            next_id: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            tx,
            rx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_cross_thread(&self) -> bool {
        self.cross_thread
    }

    fn on_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn wrong_thread(&self) -> EventError {
        EventError::WrongThread {
            bus: self.name.clone(),
        }
    }

    fn check_thread(&self) -> Result<(), EventError> {
        if self.cross_thread || self.on_owner_thread() {
            Ok(())
        } else {
            Err(self.wrong_thread())
        }
    }

    /// Hand an event from a foreign thread to the owner through the channel.
    fn forward<E: Any + Send>(&self, event: E) -> Result<bool, EventError> {
        let tx = self.tx.as_ref().ok_or_else(|| self.wrong_thread())?;
        let has_listeners = self.listener_count::<E>() > 0;
        tx.send(QueuedEvent::new(event))
            .map_err(|_| EventError::Disconnected)?;
        trace!(bus = %self.name, event = type_name::<E>(), "Forwarded event to owner thread");
        Ok(has_listeners)
    }

    /// Register `listener` for events of type `E`.
    pub fn subscribe<E, F>(&self, listener: F) -> ListenerId
    where
        E: Any,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener = Arc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                listener(event);
            }
        });
        lock(&self.listeners).push(Subscription {
            id,
            type_id: TypeId::of::<E>(),
            listener,
        });
        debug!(bus = %self.name, event = type_name::<E>(), ?id, "Listener subscribed");
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|s| s.id != id);
        before != listeners.len()
    }

    /// Number of listeners subscribed to `E`.
    pub fn listener_count<E: Any>(&self) -> usize {
        let type_id = TypeId::of::<E>();
        lock(&self.listeners)
            .iter()
            .filter(|s| s.type_id == type_id)
            .count()
    }

    fn listeners_for(&self, type_id: TypeId) -> Vec<Listener> {
        lock(&self.listeners)
            .iter()
            .filter(|s| s.type_id == type_id)
            .map(|s| Arc::clone(&s.listener))
            .collect()
    }

    fn dispatch(&self, type_id: TypeId, type_name: &str, event: &dyn Any) -> bool {
        let listeners = self.listeners_for(type_id);
        trace!(bus = %self.name, event = type_name, listeners = listeners.len(), "Dispatching event");
        for listener in &listeners {
            listener(event);
        }
        !listeners.is_empty()
    }

    /// Deliver `event` to its current listeners now, in subscription order.
    ///
    /// Returns whether any listener received it. Called from a foreign thread
    /// of a cross-thread bus, the event is forwarded to the owner and delivered
    /// on its next [`update`](Self::update); the result then says whether `E`
    /// has listeners.
    pub fn trigger<E: Any + Send>(&self, event: E) -> Result<bool, EventError> {
        if !self.on_owner_thread() {
            return self.forward(event);
        }
        Ok(self.dispatch(TypeId::of::<E>(), type_name::<E>(), &event))
    }

    /// Queue `event` for the next [`update`](Self::update).
    ///
    /// Returns whether `E` currently has listeners. The event is queued either way.
    pub fn queue<E: Any + Send>(&self, event: E) -> Result<bool, EventError> {
        if !self.on_owner_thread() {
            return self.forward(event);
        }
        let has_listeners = self.listener_count::<E>() > 0;
        if !has_listeners {
            debug!(bus = %self.name, event = type_name::<E>(), "Queued event has no listeners");
        }
        lock(&self.queue).push_back(QueuedEvent::new(event));
        Ok(has_listeners)
    }

    /// Remove the first queued `E`, or every queued `E` when `all` is set.
    ///
    /// Returns whether anything was removed.
    pub fn abort<E: Any>(&self, all: bool) -> Result<bool, EventError> {
        self.check_thread()?;
        self.drain_channel();
        let type_id = TypeId::of::<E>();
        let mut queue = lock(&self.queue);
        let removed = if all {
            let before = queue.len();
            queue.retain(|q| q.type_id != type_id);
            before - queue.len()
        } else {
            match queue.iter().position(|q| q.type_id == type_id) {
                Some(index) => usize::from(queue.remove(index).is_some()),
                None => 0,
            }
        };
        if removed > 0 {
            debug!(bus = %self.name, event = type_name::<E>(), removed, "Aborted queued events");
        }
        Ok(removed > 0)
    }

    /// A sender for publishing from other threads. `None` unless cross-thread.
    pub fn sender(&self) -> Option<EventSender> {
        self.tx.as_ref().map(|tx| EventSender { tx: tx.clone() })
    }

    /// Number of events waiting for [`update`](Self::update), including channel sends.
    pub fn pending(&self) -> usize {
        lock(&self.queue).len() + self.rx.as_ref().map_or(0, Receiver::len)
    }

    fn drain_channel(&self) {
        let Some(rx) = &self.rx else {
            return;
        };
        let mut queue = lock(&self.queue);
        loop {
            match rx.try_recv() {
                Ok(event) => queue.push_back(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Deliver queued events in FIFO order until the queue is empty or
    /// `max_duration` has elapsed.
    ///
    /// Only events queued before the call are delivered; events queued by
    /// listeners during the update wait for the next one. Returns true when
    /// every such event was delivered. Only the owner thread may update.
    pub fn update(&self, max_duration: Duration) -> Result<bool, EventError> {
        if !self.on_owner_thread() {
            return Err(self.wrong_thread());
        }
        self.drain_channel();

        let start = Instant::now();
        let mut batch = std::mem::take(&mut *lock(&self.queue));
        let mut delivered = 0usize;

        while let Some(event) = batch.pop_front() {
            self.dispatch(event.type_id, event.type_name, event.payload.as_ref());
            delivered += 1;
            if start.elapsed() >= max_duration && !batch.is_empty() {
                break;
            }
        }

        let drained = batch.is_empty();
        if !drained {
            warn!(
                bus = %self.name,
                delivered,
                remaining = batch.len(),
                "Event update ran out of time"
            );
            // Undelivered events go back ahead of anything queued meanwhile.
            let mut queue = lock(&self.queue);
            while let Some(event) = batch.pop_back() {
                queue.push_front(event);
            }
        }
        Ok(drained)
    }

    /// Drop every queued event without delivering it.
    pub fn clear_queue(&self) -> usize {
        self.drain_channel();
        let mut queue = lock(&self.queue);
        let count = queue.len();
        queue.clear();
        count
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        let pending = self.clear_queue();
        if pending > 0 {
            warn!(bus = %self.name, pending, "Event bus dropped with undelivered events");
        }
        debug!(bus = %self.name, "Event bus destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping(u32);

    #[derive(Debug, Clone, PartialEq)]
    struct Pong;

    fn recorder() -> (Arc<StdMutex<Vec<u32>>>, impl Fn(&Ping) + Send + Sync + 'static) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |p: &Ping| sink.lock().unwrap().push(p.0))
    }

    #[test]
    fn test_trigger_delivers_in_subscription_order() {
        let bus = EventBus::new("test", false);
        let order = Arc::new(StdMutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            bus.subscribe(move |_: &Ping| order.lock().unwrap().push(tag));
        }

        assert!(bus.trigger(Ping(1)).unwrap());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_trigger_only_reaches_matching_type() {
        let bus = EventBus::new("test", false);
        let (seen, listener) = recorder();
        bus.subscribe(listener);

        assert!(!bus.trigger(Pong).unwrap());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new("test", false);
        let (seen, listener) = recorder();
        let id = bus.subscribe(listener);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(!bus.trigger(Ping(1)).unwrap());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_queue_defers_until_update() {
        let bus = EventBus::new("test", false);
        let (seen, listener) = recorder();
        bus.subscribe(listener);

        assert!(bus.queue(Ping(1)).unwrap());
        assert!(bus.queue(Ping(2)).unwrap());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(bus.pending(), 2);

        assert!(bus.update(Duration::MAX).unwrap());
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn test_queue_without_listeners_still_queues() {
        let bus = EventBus::new("test", false);
        assert!(!bus.queue(Pong).unwrap());
        assert_eq!(bus.pending(), 1);
    }

    #[test]
    fn test_abort_first_or_all() {
        let bus = EventBus::new("test", false);
        let (seen, listener) = recorder();
        bus.subscribe(listener);
        for i in 1..=3 {
            bus.queue(Ping(i)).unwrap();
        }
        bus.queue(Pong).unwrap();

        assert!(bus.abort::<Ping>(false).unwrap());
        bus.update(Duration::MAX).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![2, 3]);

        bus.queue(Ping(4)).unwrap();
        bus.queue(Ping(5)).unwrap();
        assert!(bus.abort::<Ping>(true).unwrap());
        assert!(!bus.abort::<Ping>(true).unwrap());
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn test_update_with_zero_budget_leaves_remainder_queued() {
        let bus = EventBus::new("test", false);
        let (seen, listener) = recorder();
        bus.subscribe(listener);
        for i in 1..=3 {
            bus.queue(Ping(i)).unwrap();
        }

        assert!(!bus.update(Duration::ZERO).unwrap());
        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(bus.pending(), 2);

        assert!(bus.update(Duration::MAX).unwrap());
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_events_queued_by_listener_wait_for_next_update() {
        let bus = Arc::new(EventBus::new("test", false));
        let (seen, listener) = recorder();
        bus.subscribe(listener);
        let weak = Arc::downgrade(&bus);
        bus.subscribe(move |_: &Pong| {
            if let Some(bus) = weak.upgrade() {
                bus.queue(Ping(9)).unwrap();
            }
        });

        bus.queue(Pong).unwrap();
        assert!(bus.update(Duration::MAX).unwrap());
        assert!(seen.lock().unwrap().is_empty());

        bus.update(Duration::MAX).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![9]);
    }

    #[test]
    fn test_listener_can_subscribe_during_dispatch() {
        let bus = Arc::new(EventBus::new("test", false));
        let weak = Arc::downgrade(&bus);
        bus.subscribe(move |_: &Pong| {
            if let Some(bus) = weak.upgrade() {
                bus.subscribe(|_: &Ping| {});
            }
        });

        bus.trigger(Pong).unwrap();
        assert_eq!(bus.listener_count::<Ping>(), 1);
    }

    #[test]
    fn test_foreign_thread_rejected_without_cross_thread() {
        let bus = Arc::new(EventBus::new("local", false));
        assert!(bus.sender().is_none());

        let remote = Arc::clone(&bus);
        let result = thread::spawn(move || remote.queue(Ping(1)))
            .join()
            .unwrap();
        assert_eq!(
            result,
            Err(EventError::WrongThread {
                bus: "local".to_string()
            })
        );
    }

    #[test]
    fn test_cross_thread_sender_preserves_per_publisher_order() {
        let bus = EventBus::new("shared", true);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(move |p: &Ping| sink.lock().unwrap().push(p.0));

        let publishers: Vec<_> = (0..2u32)
            .map(|publisher| {
                let sender = bus.sender().unwrap();
                thread::spawn(move || {
                    for i in 0..50 {
                        sender.send(Ping(publisher * 1000 + i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in publishers {
            handle.join().unwrap();
        }

        assert!(bus.update(Duration::MAX).unwrap());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 100);
        for publisher in 0..2u32 {
            let own: Vec<u32> = seen
                .iter()
                .copied()
                .filter(|v| v / 1000 == publisher)
                .collect();
            let expected: Vec<u32> = (0..50).map(|i| publisher * 1000 + i).collect();
            assert_eq!(own, expected);
        }
    }

    #[test]
    fn test_foreign_triggers_never_run_a_listener_concurrently() {
        let bus = Arc::new(EventBus::new("shared", true));
        let owner = thread::current().id();
        let running = Arc::new(AtomicU64::new(0));
        let max_running = Arc::new(AtomicU64::new(0));
        let seen = Arc::new(StdMutex::new(Vec::new()));
        {
            let running = Arc::clone(&running);
            let max_running = Arc::clone(&max_running);
            let seen = Arc::clone(&seen);
            bus.subscribe(move |p: &Ping| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_running.fetch_max(now, Ordering::SeqCst);
                assert_eq!(thread::current().id(), owner);
                thread::sleep(Duration::from_millis(50));
                seen.lock().unwrap().push(p.0);
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        let publishers: Vec<_> = (0..2u32)
            .map(|i| {
                let bus = Arc::clone(&bus);
                thread::spawn(move || bus.trigger(Ping(i)))
            })
            .collect();
        for handle in publishers {
            assert_eq!(handle.join().unwrap(), Ok(true));
        }

        assert_eq!(bus.pending(), 2);
        assert!(bus.update(Duration::MAX).unwrap());
        assert_eq!(max_running.load(Ordering::SeqCst), 1);
        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_update_is_owner_only() {
        let bus = Arc::new(EventBus::new("shared", true));
        bus.queue(Pong).unwrap();

        let remote = Arc::clone(&bus);
        let result = thread::spawn(move || remote.update(Duration::MAX))
            .join()
            .unwrap();
        assert_eq!(
            result,
            Err(EventError::WrongThread {
                bus: "shared".to_string()
            })
        );
        assert_eq!(bus.pending(), 1);
    }

    #[test]
    fn test_sender_after_bus_dropped() {
        let bus = EventBus::new("shared", true);
        let sender = bus.sender().unwrap();
        drop(bus);
        assert_eq!(sender.send(Pong), Err(EventError::Disconnected));
    }
}
