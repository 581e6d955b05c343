//! reqwest-backed streaming transport

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::Client;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{Flow, TransferOutcome, TransferRequest, TransferSink, Transport, TransportError};
use crate::config::TransportConfig;

/// HTTP/1.1 streaming transport
///
/// Each `perform` call runs on a current-thread tokio runtime owned by the
/// calling thread, so the transfer blocks the caller like a plain blocking
/// call would. Connection pooling is disabled because the runtime, and with
/// it any pooled connection, is gone once the attempt ends.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    connect_timeout: Duration,
    progress_interval: Duration,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            progress_interval: Duration::from_millis(config.progress_interval_ms.max(1)),
            user_agent: config.user_agent.clone(),
        }
    }

    fn build_client(&self, max_redirects: usize) -> Result<Client, reqwest::Error> {
        Client::builder()
            .http1_only()
            .redirect(Policy::limited(max_redirects))
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(0)
            .user_agent(self.user_agent.clone())
            .build()
    }

    async fn stream(
        &self,
        client: Client,
        request: &TransferRequest,
        sink: &mut dyn TransferSink,
    ) -> TransferOutcome {
        let headers = match build_header_map(&request.headers) {
            Ok(headers) => headers,
            Err(error) => {
                return TransferOutcome::Failed {
                    status: None,
                    error,
                }
            }
        };

        let mut ticker = tokio::time::interval(self.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let send = client.get(&request.url).headers(headers).send();
        tokio::pin!(send);

        let result = loop {
            tokio::select! {
                result = &mut send => break result,
                _ = ticker.tick() => {
                    if sink.on_progress() == Flow::Abort {
                        return TransferOutcome::Aborted;
                    }
                }
            }
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return TransferOutcome::Failed {
                    status: e.status().map(|s| s.as_u16()),
                    error: TransportError::Request(e.to_string()),
                }
            }
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return TransferOutcome::Failed {
                status: Some(status),
                error: TransportError::Status(status),
            };
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("text/event-stream") {
            warn!("Unexpected content type for event stream: {:?}", content_type);
        }

        debug!("Event stream connected: {} ({})", response.url(), status);

        if sink.on_data(&[]) == Flow::Abort {
            return TransferOutcome::Aborted;
        }

        let mut body = response.bytes_stream();

        loop {
            tokio::select! {
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        if sink.on_data(&bytes) == Flow::Abort {
                            return TransferOutcome::Aborted;
                        }
                    }
                    Some(Err(e)) => {
                        return TransferOutcome::Failed {
                            status: Some(status),
                            error: TransportError::Body(e.to_string()),
                        }
                    }
                    None => return TransferOutcome::Completed { status },
                },
                _ = ticker.tick() => {
                    if sink.on_progress() == Flow::Abort {
                        return TransferOutcome::Aborted;
                    }
                }
            }
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

impl Transport for HttpTransport {
    fn perform(&self, request: &TransferRequest, sink: &mut dyn TransferSink) -> TransferOutcome {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                return TransferOutcome::Failed {
                    status: None,
                    error: TransportError::Runtime(e.to_string()),
                }
            }
        };

        let client = match self.build_client(request.max_redirects) {
            Ok(client) => client,
            Err(e) => {
                return TransferOutcome::Failed {
                    status: None,
                    error: TransportError::Request(e.to_string()),
                }
            }
        };

        if request.with_credentials {
            debug!("Credentials flag set; relying on caller-supplied headers");
        }

        runtime.block_on(self.stream(client, request, sink))
    }
}

fn build_header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidHeader(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidHeader(format!("{}: {}", name, e)))?;
        map.append(name, value);
    }
    Ok(map)
}
