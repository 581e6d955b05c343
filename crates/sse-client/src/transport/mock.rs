//! Scripted transport for testing
//!
//! Replays a queue of attempts, each a sequence of body chunks followed by an
//! ending. Every request is recorded so tests can inspect the headers the
//! session sent.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use super::{Flow, TransferOutcome, TransferRequest, TransferSink, Transport, TransportError};

/// How a scripted attempt ends once its chunks are delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedEnd {
    /// Body ends normally with status 200
    Complete,
    /// Transfer fails, optionally with an HTTP status
    Fail(Option<u16>),
    /// Stream stays open until the sink aborts it
    Hang,
}

/// One scripted transfer
#[derive(Debug, Clone)]
pub struct ScriptedAttempt {
    pub chunks: Vec<Vec<u8>>,
    pub end: ScriptedEnd,
}

impl ScriptedAttempt {
    pub fn completed<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self::with_end(chunks, ScriptedEnd::Complete)
    }

    pub fn failed<I, C>(status: Option<u16>, chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self::with_end(chunks, ScriptedEnd::Fail(status))
    }

    pub fn hang<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self::with_end(chunks, ScriptedEnd::Hang)
    }

    fn with_end<I, C>(chunks: I, end: ScriptedEnd) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            end,
        }
    }
}

/// Transport that replays scripted attempts
///
/// Once the script is exhausted every further attempt hangs until aborted.
pub struct ScriptedTransport {
    attempts: Mutex<VecDeque<ScriptedAttempt>>,
    requests: Mutex<Vec<TransferRequest>>,
    progress_interval: Duration,
}

impl ScriptedTransport {
    pub fn new(attempts: impl IntoIterator<Item = ScriptedAttempt>) -> Self {
        Self {
            attempts: Mutex::new(attempts.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            progress_interval: Duration::from_millis(5),
        }
    }

    /// Queue another attempt
    pub fn push(&self, attempt: ScriptedAttempt) {
        self.attempts.lock().push_back(attempt);
    }

    /// Requests seen so far, in order
    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().clone()
    }

    /// Number of attempts performed so far
    pub fn attempt_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Default for ScriptedTransport {
    /// Empty script: every attempt hangs until aborted
    fn default() -> Self {
        Self::new(Vec::<ScriptedAttempt>::new())
    }
}

impl Transport for ScriptedTransport {
    fn perform(&self, request: &TransferRequest, sink: &mut dyn TransferSink) -> TransferOutcome {
        self.requests.lock().push(request.clone());

        let attempt = self
            .attempts
            .lock()
            .pop_front()
            .unwrap_or_else(|| ScriptedAttempt::hang(Vec::<Vec<u8>>::new()));

        for chunk in &attempt.chunks {
            if sink.on_progress() == Flow::Abort || sink.on_data(chunk) == Flow::Abort {
                return TransferOutcome::Aborted;
            }
        }

        match attempt.end {
            ScriptedEnd::Complete => TransferOutcome::Completed { status: 200 },
            ScriptedEnd::Fail(status) => TransferOutcome::Failed {
                status,
                error: TransportError::Scripted("scripted failure".to_string()),
            },
            ScriptedEnd::Hang => loop {
                if sink.on_progress() == Flow::Abort {
                    return TransferOutcome::Aborted;
                }
                std::thread::sleep(self.progress_interval);
            },
        }
    }
}
