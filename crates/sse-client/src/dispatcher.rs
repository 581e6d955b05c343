//! Event delivery to the legacy callback and typed listeners

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::event::Event;
use crate::state::LifecycleFlags;

/// Handler invoked for delivered events
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Owns the single callback slot and the per-type listener table.
///
/// No lock is held while user code runs: the callback is cloned out of its
/// slot and listeners are snapshotted before iteration. A panicking handler is
/// logged and skipped.
pub(crate) struct Dispatcher {
    flags: Arc<LifecycleFlags>,
    callback: Mutex<Option<EventHandler>>,
    listeners: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl Dispatcher {
    pub fn new(flags: Arc<LifecycleFlags>) -> Self {
        Self {
            flags,
            callback: Mutex::new(None),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Replace (or clear) the legacy callback
    pub fn set_callback(&self, callback: Option<EventHandler>) {
        *self.callback.lock() = callback;
    }

    pub fn add_listener(&self, event_type: &str, listener: EventHandler) {
        self.listeners
            .lock()
            .entry(event_type.to_string())
            .or_default()
            .push(listener);
    }

    /// Remove the most recently added listener for `event_type`
    pub fn remove_last_listener(&self, event_type: &str) -> bool {
        let mut listeners = self.listeners.lock();

        let Some(list) = listeners.get_mut(event_type) else {
            return false;
        };

        let removed = list.pop().is_some();
        if list.is_empty() {
            listeners.remove(event_type);
        }
        removed
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners
            .lock()
            .get(event_type)
            .map_or(0, |list| list.len())
    }

    pub fn clear_callback(&self) {
        self.callback.lock().take();
    }

    pub fn clear_listeners(&self) {
        self.listeners.lock().clear();
    }

    /// Deliver one event to the callback, then to listeners of its type
    pub fn dispatch(&self, event: &Event) {
        if self.flags.is_closed() {
            return;
        }

        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            invoke(&callback, event, "event callback");
        }

        let listeners = self
            .listeners
            .lock()
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default();

        for listener in &listeners {
            if self.flags.is_closed() {
                debug!("Shutdown during dispatch of [{}]", event.event_type);
                break;
            }
            invoke(listener, event, "event listener");
        }
    }
}

fn invoke(handler: &EventHandler, event: &Event, origin: &str) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
        error!(
            "Panic in {} [{}]: {}",
            origin,
            event.event_type,
            panic_message(payload.as_ref())
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, tag: &str) -> EventHandler {
        let log = log.clone();
        let tag = tag.to_string();
        Arc::new(move |event: &Event| log.lock().push(format!("{}:{}", tag, event.data)))
    }

    fn dispatcher() -> (Arc<LifecycleFlags>, Dispatcher) {
        let flags = Arc::new(LifecycleFlags::default());
        (flags.clone(), Dispatcher::new(flags))
    }

    #[test]
    fn test_callback_runs_before_listeners() {
        let (_, dispatcher) = dispatcher();
        let log = Log::default();
        dispatcher.add_listener("message", recorder(&log, "first"));
        dispatcher.add_listener("message", recorder(&log, "second"));
        dispatcher.set_callback(Some(recorder(&log, "callback")));

        dispatcher.dispatch(&Event::new("", "message", "x"));

        assert_eq!(
            *log.lock(),
            vec!["callback:x", "first:x", "second:x"]
        );
    }

    #[test]
    fn test_listeners_filtered_by_type() {
        let (_, dispatcher) = dispatcher();
        let log = Log::default();
        dispatcher.add_listener("notice", recorder(&log, "notice"));
        dispatcher.add_listener("message", recorder(&log, "message"));

        dispatcher.dispatch(&Event::new("", "notice", "n"));

        assert_eq!(*log.lock(), vec!["notice:n"]);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let (_, dispatcher) = dispatcher();
        let log = Log::default();
        dispatcher.set_callback(Some(Arc::new(|_: &Event| panic!("callback boom"))));
        dispatcher.add_listener("message", Arc::new(|_: &Event| panic!("listener boom")));
        dispatcher.add_listener("message", recorder(&log, "after"));

        dispatcher.dispatch(&Event::new("", "message", "1"));
        dispatcher.dispatch(&Event::new("", "message", "2"));

        assert_eq!(*log.lock(), vec!["after:1", "after:2"]);
    }

    #[test]
    fn test_remove_is_lifo_per_type() {
        let (_, dispatcher) = dispatcher();
        let log = Log::default();
        dispatcher.add_listener("message", recorder(&log, "a"));
        dispatcher.add_listener("message", recorder(&log, "b"));
        dispatcher.add_listener("message", recorder(&log, "c"));

        assert!(dispatcher.remove_last_listener("message"));
        dispatcher.dispatch(&Event::new("", "message", "x"));
        assert_eq!(*log.lock(), vec!["a:x", "b:x"]);

        assert!(dispatcher.remove_last_listener("message"));
        assert!(dispatcher.remove_last_listener("message"));
        assert!(!dispatcher.remove_last_listener("message"));
        assert_eq!(dispatcher.listener_count("message"), 0);
        assert!(!dispatcher.remove_last_listener("unknown"));
    }

    #[test]
    fn test_nothing_dispatched_after_close() {
        let (flags, dispatcher) = dispatcher();
        let log = Log::default();
        dispatcher.set_callback(Some(recorder(&log, "callback")));

        assert!(flags.try_begin_close());
        dispatcher.dispatch(&Event::new("", "message", "late"));

        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_close_mid_delivery_stops_remaining_listeners() {
        let (flags, dispatcher) = dispatcher();
        let log = Log::default();
        let closer = flags.clone();
        dispatcher.add_listener(
            "message",
            Arc::new(move |_: &Event| {
                closer.try_begin_close();
            }),
        );
        dispatcher.add_listener("message", recorder(&log, "skipped"));

        dispatcher.dispatch(&Event::new("", "message", "x"));

        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_listener_may_mutate_table_during_delivery() {
        let flags = Arc::new(LifecycleFlags::default());
        let dispatcher = Arc::new(Dispatcher::new(flags));
        let log = Log::default();
        let inner = dispatcher.clone();
        let inner_log = log.clone();
        dispatcher.add_listener(
            "message",
            Arc::new(move |_: &Event| {
                inner.add_listener("message", recorder(&inner_log, "added"));
            }),
        );

        dispatcher.dispatch(&Event::new("", "message", "1"));
        assert!(log.lock().is_empty());
        assert_eq!(dispatcher.listener_count("message"), 2);

        dispatcher.dispatch(&Event::new("", "message", "2"));
        assert_eq!(*log.lock(), vec!["added:2"]);
    }
}
