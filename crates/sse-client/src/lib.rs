//! Reconnecting Server-Sent Events client
//!
//! Maintains a long-lived streaming HTTP connection to an SSE endpoint,
//! parses the `text/event-stream` format incrementally, and delivers events to
//! registered handlers. Dropped connections are retried automatically and the
//! last event id is sent back as `Last-Event-ID` on every reconnect.
//!
//! # Example
//!
//! ```rust,no_run
//! use sse_client::{EventSource, EventSourceOptions};
//!
//! fn main() -> sse_client::Result<()> {
//!     // Handlers registered here are in place before the first connection
//!     let source = EventSource::create_with(
//!         "http://localhost:8080/events",
//!         EventSourceOptions::default(),
//!         |source| {
//!             // Catch-all callback: open, message, error and custom types
//!             source.set_event_callback(|event| {
//!                 println!("{} {}: {}", event.id, event.event_type, event.data);
//!             });
//!
//!             // Typed listener
//!             source.add_event_listener("notice", |event| println!("notice: {}", event.data));
//!         },
//!     )?;
//!
//!     std::thread::sleep(std::time::Duration::from_secs(10));
//!
//!     // Blocks until the connection thread has stopped
//!     source.close();
//!     Ok(())
//! }
//! ```
//!
//! # Threading
//!
//! Each `EventSource` owns one background thread that performs the blocking
//! transfer and runs all handlers. Registration and `close()` may be called
//! from any thread.
//!
//! # Testing
//!
//! The `testing` module provides a scripted in-process SSE server, and
//! [`transport::mock::ScriptedTransport`] replays transfers without a network:
//!
//! ```rust,ignore
//! use sse_client::testing::{ScriptedResponse, StreamScript, TestServer};
//!
//! let script = StreamScript::new([ScriptedResponse::events(["data: hi\n\n"])]);
//! let server = TestServer::start(script.router()).await?;
//! ```

pub mod config;
mod dispatcher;
mod error;
pub mod event;
pub mod parser;
mod reconnect;
mod session;
mod source;
mod state;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, EventSourceOptions, ReconnectConfig, TransportConfig};
pub use dispatcher::EventHandler;
pub use error::{Result, SseClientError};
pub use event::Event;
pub use parser::SseParser;
pub use session::request_headers;
pub use source::{EventSource, WeakEventSource};
pub use transport::{HttpTransport, Transport};
