//! Public event source handle and its lifecycle

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::EventSourceOptions;
use crate::dispatcher::{Dispatcher, EventHandler};
use crate::error::{Result, SseClientError};
use crate::event::Event;
use crate::reconnect;
use crate::session::ConnectionSession;
use crate::state::LifecycleFlags;
use crate::transport::{HttpTransport, Transport};

/// A reconnecting Server-Sent Events client
///
/// Creating an `EventSource` immediately starts a background thread that
/// connects to the URL, reconnects after the stream ends or fails, and
/// delivers parsed events to the registered callback and listeners on that
/// thread.
///
/// The handle is cheap to clone. Dropping the last clone closes the source.
/// A handler that needs to reach the source must capture a
/// [`WeakEventSource`] instead of a clone, otherwise the source keeps itself
/// alive through its own handler table.
///
/// # Example
///
/// ```no_run
/// use sse_client::{EventSource, EventSourceOptions};
///
/// # fn main() -> sse_client::Result<()> {
/// let source = EventSource::create(
///     "http://localhost:8080/events",
///     EventSourceOptions::builder().header("Authorization", "Bearer t").build(),
/// )?;
///
/// source.add_event_listener("notice", |event| println!("{}", event.data));
/// source.set_event_callback(|event| println!("[{}] {}", event.event_type, event.data));
///
/// // ...
/// source.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EventSource {
    handle: Arc<Handle>,
}

/// Non-owning handle for use inside handlers
///
/// Obtained from [`EventSource::downgrade`]. Does not keep the source open.
#[derive(Clone)]
pub struct WeakEventSource {
    handle: Weak<Handle>,
}

impl WeakEventSource {
    /// The source, if any owning handle is still alive
    pub fn upgrade(&self) -> Option<EventSource> {
        self.handle.upgrade().map(|handle| EventSource { handle })
    }
}

/// Held only by `EventSource` clones; closes the source when the last one goes
struct Handle {
    inner: Arc<SourceInner>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.inner.close();
    }
}

pub(crate) struct SourceInner {
    url: String,
    pub(crate) flags: Arc<LifecycleFlags>,
    pub(crate) session: ConnectionSession,
    dispatcher: Arc<Dispatcher>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventSource {
    /// Connect to `url` over HTTP
    pub fn create(url: &str, options: EventSourceOptions) -> Result<Self> {
        Self::create_with(url, options, |_| {})
    }

    /// Connect to `url` over HTTP, running `setup` before the connection
    /// thread starts.
    ///
    /// Handlers registered in `setup` are guaranteed to see the first `open`
    /// event.
    pub fn create_with<F>(url: &str, options: EventSourceOptions, setup: F) -> Result<Self>
    where
        F: FnOnce(&EventSource),
    {
        let transport = Arc::new(HttpTransport::new(&options.transport));
        Self::with_transport_and_setup(url, options, transport, setup)
    }

    /// Connect to `url` with default options
    pub fn connect(url: &str) -> Result<Self> {
        Self::create(url, EventSourceOptions::default())
    }

    /// Connect using a caller-supplied transport
    pub fn with_transport(
        url: &str,
        options: EventSourceOptions,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        Self::with_transport_and_setup(url, options, transport, |_| {})
    }

    /// Connect using a caller-supplied transport, running `setup` before the
    /// connection thread starts
    pub fn with_transport_and_setup<F>(
        url: &str,
        options: EventSourceOptions,
        transport: Arc<dyn Transport>,
        setup: F,
    ) -> Result<Self>
    where
        F: FnOnce(&EventSource),
    {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SseClientError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        let flags = Arc::new(LifecycleFlags::default());
        let dispatcher = Arc::new(Dispatcher::new(flags.clone()));
        let session = ConnectionSession::new(
            url.to_string(),
            options,
            transport,
            flags.clone(),
            dispatcher.clone(),
        );

        let source = Self {
            handle: Arc::new(Handle {
                inner: Arc::new(SourceInner {
                    url: url.to_string(),
                    flags,
                    session,
                    dispatcher,
                    worker: Mutex::new(None),
                }),
            }),
        };

        setup(&source);

        let weak = Arc::downgrade(&source.handle.inner);
        let worker = thread::Builder::new()
            .name("sse-connection".to_string())
            .spawn(move || reconnect::run(weak))
            .map_err(|e| {
                error!("Failed to create connection thread: {}", e);
                SseClientError::Spawn(e)
            })?;
        *source.inner().worker.lock() = Some(worker);

        info!("EventSource created for {}", url);

        Ok(source)
    }

    /// Non-owning handle, safe to capture in this source's own handlers
    pub fn downgrade(&self) -> WeakEventSource {
        WeakEventSource {
            handle: Arc::downgrade(&self.handle),
        }
    }

    /// Close the source.
    ///
    /// Idempotent and callable from any thread. The first call stops the
    /// connection loop and waits for its thread to finish, so no callback or
    /// listener runs after it returns. Later calls return immediately.
    pub fn close(&self) {
        self.inner().close();
    }

    /// Replace the single catch-all callback.
    ///
    /// The callback lives as long as the source; capture a
    /// [`WeakEventSource`] rather than an `EventSource` clone in it.
    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner().dispatcher.set_callback(Some(Arc::new(callback)));
    }

    /// Remove the catch-all callback
    pub fn clear_event_callback(&self) {
        self.inner().dispatcher.set_callback(None);
    }

    /// Register a listener for events of `event_type`.
    ///
    /// Ignored once the source is closed. As with the callback, a listener
    /// holding an `EventSource` clone keeps the source open until `close()`.
    pub fn add_event_listener<F>(&self, event_type: &str, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add_event_handler(event_type, Arc::new(listener));
    }

    /// Register an already shared handler for events of `event_type`
    pub fn add_event_handler(&self, event_type: &str, handler: EventHandler) {
        let inner = self.inner();
        if inner.flags.is_closed() {
            warn!("Cannot add listener to closed EventSource");
            return;
        }
        inner.dispatcher.add_listener(event_type, handler);
    }

    /// Remove the most recently added listener for `event_type`.
    ///
    /// Removal is last-in-first-out per type: handlers are not compared, so
    /// callers that need to remove a particular one must track registration
    /// order themselves. Returns whether a listener was removed.
    pub fn remove_event_listener(&self, event_type: &str) -> bool {
        self.inner().dispatcher.remove_last_listener(event_type)
    }

    /// Number of listeners registered for `event_type`
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner().dispatcher.listener_count(event_type)
    }

    pub fn url(&self) -> &str {
        &self.inner().url
    }

    /// Last event id received (or seeded), sent as `Last-Event-ID` on reconnect
    pub fn last_event_id(&self) -> String {
        self.inner().session.last_event_id()
    }

    pub fn is_closed(&self) -> bool {
        self.inner().flags.is_closed()
    }

    fn inner(&self) -> &SourceInner {
        &self.handle.inner
    }
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("url", &self.url())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SourceInner {
    fn close(&self) {
        if !self.flags.try_begin_close() {
            debug!("EventSource already closed, skipping...");
            return;
        }

        info!("Closing EventSource...");

        self.flags.stop();
        self.dispatcher.clear_callback();
        self.dispatcher.clear_listeners();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                // Closed from a handler; the loop exits once the handler returns
                debug!("Close requested from the connection thread");
            } else if worker.join().is_err() {
                error!("Connection thread panicked");
            } else {
                debug!("Connection thread joined");
            }
        }

        self.session.clear_buffers();

        info!("EventSource closed successfully");
    }
}
