//! Integration tests for sse-client
//!
//! These tests spin up a real SSE server and connect an `EventSource` to it
//! over HTTP, covering reconnection, header injection and shutdown.

use std::time::Duration;

use sse_client::testing::{wait_for, EventRecorder, ScriptedResponse, StreamScript, TestServer};
use sse_client::{Event, EventSource, EventSourceOptions};

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_options() -> EventSourceOptions {
    EventSourceOptions::builder()
        .reconnect_delay_ms(50)
        .poll_interval_ms(10)
        .build()
}

/// Close on a blocking thread; `close` joins the connection thread
async fn close(source: EventSource) {
    tokio::task::spawn_blocking(move || source.close())
        .await
        .unwrap();
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_receives_events_split_across_chunks() {
    let script = StreamScript::new([ScriptedResponse::events([
        "event: not",
        "ice\ndata: hello\nda",
        "ta: world\nid: 42\n\n",
        "data: lonely\n\n",
    ])
    .chunk_delay(Duration::from_millis(5))
    .hold_open()]);
    let server = TestServer::start(script.router()).await.unwrap();

    let recorder = EventRecorder::new();
    let source = EventSource::create_with(&server.url("/events"), fast_options(), |source| {
        source.set_event_callback(recorder.handler());
    })
    .unwrap();

    assert!(wait_for(|| recorder.len() >= 3, TIMEOUT).await);

    assert_eq!(
        recorder.events(),
        vec![
            Event::open(""),
            Event::new("42", "notice", "hello\nworld"),
            Event::new("42", "message", "lonely"),
        ]
    );
    assert_eq!(source.last_event_id(), "42");

    close(source).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_typed_listeners_and_lifo_removal() {
    let script = StreamScript::new([ScriptedResponse::events([
        "event: notice\ndata: n1\n\n",
        "data: m1\n\n",
    ])
    .hold_open()]);
    let server = TestServer::start(script.router()).await.unwrap();

    let notices = EventRecorder::new();
    let removed = EventRecorder::new();
    let messages = EventRecorder::new();
    let source = EventSource::create_with(&server.url("/events"), fast_options(), |source| {
        source.add_event_listener("notice", notices.handler());
        source.add_event_listener("notice", removed.handler());
        source.add_event_listener("message", messages.handler());

        // Removes the most recently added "notice" listener
        assert!(source.remove_event_listener("notice"));
    })
    .unwrap();
    assert_eq!(source.listener_count("notice"), 1);

    assert!(wait_for(|| messages.len() == 1, TIMEOUT).await);

    assert_eq!(notices.events(), vec![Event::new("", "notice", "n1")]);
    assert!(removed.is_empty());
    assert_eq!(messages.events(), vec![Event::new("", "message", "m1")]);

    close(source).await;
}

// =============================================================================
// Reconnection
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconnects_with_last_event_id() {
    let script = StreamScript::new([
        ScriptedResponse::events(["id: 7\ndata: first\n\n"]),
        ScriptedResponse::events(["data: second\n\n"]).hold_open(),
    ]);
    let server = TestServer::start(script.router()).await.unwrap();

    let recorder = EventRecorder::new();
    let source = EventSource::create_with(&server.url("/events"), fast_options(), |source| {
        source.set_event_callback(recorder.handler());
    })
    .unwrap();

    assert!(wait_for(|| recorder.of_type("message").len() == 2, TIMEOUT).await);

    let requests = script.requests();
    assert!(requests[0].get("last-event-id").is_none());
    assert_eq!(requests[1].get("last-event-id").unwrap(), "7");

    // One open per attempt, each before that attempt's message
    let types: Vec<String> = recorder
        .events()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(types, vec!["open", "message", "open", "message"]);
    assert_eq!(recorder.events()[3], Event::new("7", "message", "second"));

    close(source).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http_error_dispatches_error_event_and_retries() {
    let script = StreamScript::new([
        ScriptedResponse::status(503),
        ScriptedResponse::events(["data: recovered\n\n"]).hold_open(),
    ]);
    let server = TestServer::start(script.router()).await.unwrap();

    let recorder = EventRecorder::new();
    let source = EventSource::create_with(&server.url("/events"), fast_options(), |source| {
        source.set_event_callback(recorder.handler());
    })
    .unwrap();

    assert!(wait_for(|| recorder.of_type("message").len() == 1, TIMEOUT).await);

    assert_eq!(
        recorder.events(),
        vec![
            Event::error("", "503"),
            Event::open(""),
            Event::new("", "message", "recovered"),
        ]
    );
    assert_eq!(script.connection_count(), 2);

    close(source).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_retry_hint_drives_backoff_when_enabled() {
    let script = StreamScript::new([
        ScriptedResponse::events(["retry: 100\ndata: a\n\n"]),
        ScriptedResponse::status(500),
        ScriptedResponse::events(["data: b\n\n"]).hold_open(),
    ]);
    let server = TestServer::start(script.router()).await.unwrap();

    // The configured delay alone would outlast the test timeout
    let options = EventSourceOptions::builder()
        .reconnect_delay_ms(60_000)
        .poll_interval_ms(10)
        .honor_server_retry(true)
        .build();
    let recorder = EventRecorder::new();
    let source = EventSource::create_with(&server.url("/events"), options, |source| {
        source.set_event_callback(recorder.handler());
    })
    .unwrap();

    assert!(wait_for(|| recorder.of_type("message").len() == 2, TIMEOUT).await);
    assert_eq!(recorder.of_type("error"), vec![Event::error("", "500")]);

    close(source).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_server_keeps_retrying() {
    // Bind and release a port so nothing is listening on it
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let recorder = EventRecorder::new();
    let url = format!("http://{}/events", addr);
    let source = EventSource::create_with(&url, fast_options(), |source| {
        source.set_event_callback(recorder.handler());
    })
    .unwrap();

    assert!(wait_for(|| recorder.of_type("error").len() >= 2, TIMEOUT).await);
    // No status was obtained, so the error carries no data
    assert!(recorder.of_type("error").iter().all(|e| e.data.is_empty()));
    assert!(recorder.of_type("open").is_empty());

    close(source).await;
}

// =============================================================================
// Request headers
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fixed_and_custom_headers_sent() {
    let script = StreamScript::new(Vec::<ScriptedResponse>::new());
    let server = TestServer::start(script.router()).await.unwrap();

    let options = EventSourceOptions::builder()
        .header("Authorization", "Bearer token")
        .header("X-Client", "tests")
        .last_event_id("99")
        .build();
    let source = EventSource::create(&server.url("/events"), options).unwrap();

    assert!(wait_for(|| script.connection_count() == 1, TIMEOUT).await);

    let headers = &script.requests()[0];
    assert_eq!(headers.get("accept").unwrap(), "text/event-stream");
    assert_eq!(headers.get("cache-control").unwrap(), "no-cache");
    assert_eq!(headers.get("last-event-id").unwrap(), "99");
    assert_eq!(headers.get("authorization").unwrap(), "Bearer token");
    assert_eq!(headers.get("x-client").unwrap(), "tests");
    assert!(headers
        .get("user-agent")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("sse-client/"));

    close(source).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_follows_redirects() {
    let script = StreamScript::new([ScriptedResponse::events(["data: moved\n\n"]).hold_open()]);
    let server = TestServer::start(script.router()).await.unwrap();

    let recorder = EventRecorder::new();
    let source = EventSource::create_with(&server.url("/redirect"), fast_options(), |source| {
        source.add_event_listener("message", recorder.handler());
    })
    .unwrap();

    assert!(wait_for(|| recorder.len() == 1, TIMEOUT).await);
    assert_eq!(recorder.events()[0].data, "moved");

    close(source).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_redirect_loop_is_a_failure() {
    let script = StreamScript::new(Vec::<ScriptedResponse>::new());
    let server = TestServer::start(script.router()).await.unwrap();

    let recorder = EventRecorder::new();
    let source = EventSource::create_with(&server.url("/redirect-loop"), fast_options(), |source| {
        source.set_event_callback(recorder.handler());
    })
    .unwrap();

    assert!(wait_for(|| !recorder.of_type("error").is_empty(), TIMEOUT).await);
    assert!(recorder.of_type("open").is_empty());
    assert_eq!(script.connection_count(), 0);

    close(source).await;
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_events_after_close() {
    let chunks: Vec<String> = (0..500).map(|i| format!("data: {}\n\n", i)).collect();
    let script = StreamScript::new([ScriptedResponse::events(chunks)
        .chunk_delay(Duration::from_millis(2))
        .hold_open()]);
    let server = TestServer::start(script.router()).await.unwrap();

    let recorder = EventRecorder::new();
    let source = EventSource::create_with(&server.url("/events"), fast_options(), |source| {
        source.set_event_callback(recorder.handler());
    })
    .unwrap();

    assert!(wait_for(|| recorder.len() > 5, TIMEOUT).await);

    let closer = source.clone();
    tokio::task::spawn_blocking(move || closer.close())
        .await
        .unwrap();
    assert!(source.is_closed());

    let seen = recorder.len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.len(), seen);
    assert!(seen < 501);

    // Second close is a no-op
    close(source).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_during_backoff_returns_promptly() {
    let script = StreamScript::new([ScriptedResponse::status(500)]);
    let server = TestServer::start(script.router()).await.unwrap();

    let options = EventSourceOptions::builder()
        .reconnect_delay_ms(60_000)
        .build();
    let recorder = EventRecorder::new();
    let source = EventSource::create_with(&server.url("/events"), options, |source| {
        source.set_event_callback(recorder.handler());
    })
    .unwrap();

    assert!(wait_for(|| recorder.of_type("error").len() == 1, TIMEOUT).await);

    let started = std::time::Instant::now();
    close(source).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(script.connection_count(), 1);
}
