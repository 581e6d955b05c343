//! Test utilities for sse-client
//!
//! Provides an in-process SSE server with scripted responses and helpers for
//! collecting delivered events.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;

use crate::event::Event;

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Create a new test server from an axum Router
    ///
    /// # Example
    ///
    /// ```ignore
    /// use sse_client::testing::{ScriptedResponse, StreamScript, TestServer};
    ///
    /// let script = StreamScript::new([ScriptedResponse::events(["data: hi\n\n"])]);
    /// let server = TestServer::start(script.router()).await?;
    /// let source = EventSource::connect(&server.url("/events"))?;
    /// ```
    pub async fn start(router: Router) -> std::io::Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL for a path on the test server
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// One scripted response of the `/events` endpoint
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub chunks: Vec<Bytes>,
    /// Pause before each chunk
    pub chunk_delay: Duration,
    /// Keep the body open after the last chunk
    pub hold_open: bool,
}

impl ScriptedResponse {
    /// A 200 response streaming `chunks`, then ending
    pub fn events<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        Self {
            status: 200,
            chunks: chunks.into_iter().map(Into::into).collect(),
            chunk_delay: Duration::ZERO,
            hold_open: false,
        }
    }

    /// An empty response with the given status
    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::events(Vec::<Bytes>::new())
        }
    }

    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

/// Scripted SSE endpoint
///
/// Each connection to `/events` consumes the next scripted response; once the
/// script is exhausted connections are held open without data. `/redirect`
/// redirects to `/events` and `/redirect-loop` redirects to itself.
#[derive(Default)]
pub struct StreamScript {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<HeaderMap>>,
}

impl StreamScript {
    pub fn new(responses: impl IntoIterator<Item = ScriptedResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Router serving this script
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/events", get(serve_script))
            .route("/redirect", get(|| async { Redirect::temporary("/events") }))
            .route(
                "/redirect-loop",
                get(|| async { Redirect::temporary("/redirect-loop") }),
            )
            .with_state(self.clone())
    }

    /// Request headers of every connection so far
    pub fn requests(&self) -> Vec<HeaderMap> {
        self.requests.lock().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.requests.lock().len()
    }
}

async fn serve_script(State(script): State<Arc<StreamScript>>, headers: HeaderMap) -> Response {
    script.requests.lock().push(headers);

    let response = script
        .responses
        .lock()
        .pop_front()
        .unwrap_or_else(|| ScriptedResponse::events(Vec::<Bytes>::new()).hold_open());

    if response.status != 200 {
        return StatusCode::from_u16(response.status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
    }

    let delay = response.chunk_delay;
    let chunks = stream::iter(response.chunks).then(move |chunk| async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok::<_, Infallible>(chunk)
    });

    let body = if response.hold_open {
        Body::from_stream(chunks.chain(stream::pending()))
    } else {
        Body::from_stream(chunks)
    };

    ([(CONTENT_TYPE, "text/event-stream")], body).into_response()
}

/// Collects delivered events for assertions
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that appends every event it receives
    pub fn handler(&self) -> impl Fn(&Event) + Send + Sync + 'static {
        let events = self.events.clone();
        move |event: &Event| events.lock().push(event.clone())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Recorded events of one type
    pub fn of_type(&self, event_type: &str) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

/// Wait for a condition with timeout
pub async fn wait_for<F>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    condition()
}
