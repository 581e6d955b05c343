//! Reconnection loop run on the connection thread

use std::sync::Weak;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::ReconnectConfig;
use crate::session::AttemptResult;
use crate::source::SourceInner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopState {
    Attempting,
    Backoff,
    Stopped,
}

/// Run attempts until shutdown or until the event source is gone.
///
/// Only a weak reference is held between steps; every step re-acquires it and
/// stops if the owner has been dropped.
pub(crate) fn run(source: Weak<SourceInner>) {
    let mut state = LoopState::Attempting;
    while state != LoopState::Stopped {
        state = next_state(&source, state);
    }
    info!("Connection thread terminated");
}

fn next_state(source: &Weak<SourceInner>, state: LoopState) -> LoopState {
    let Some(inner) = source.upgrade() else {
        debug!("Event source dropped, stopping connection loop");
        return LoopState::Stopped;
    };

    if !inner.flags.should_retry() {
        return LoopState::Stopped;
    }

    match state {
        LoopState::Attempting => {
            inner.session.reset();
            match inner.session.attempt() {
                AttemptResult::Clean => LoopState::Attempting,
                AttemptResult::Failed => LoopState::Backoff,
            }
        }
        LoopState::Backoff => {
            let config = &inner.session.options().reconnect;
            let delay = backoff_delay(config, inner.session.retry_hint());
            let poll = config.poll_interval();
            drop(inner);

            warn!("Connection failed, reconnecting in {:?}...", delay);
            wait(source, delay, poll);
            LoopState::Attempting
        }
        LoopState::Stopped => LoopState::Stopped,
    }
}

/// Delay before the next attempt after a failure
pub(crate) fn backoff_delay(config: &ReconnectConfig, server_hint: Option<Duration>) -> Duration {
    match server_hint {
        Some(hint) if config.honor_server_retry => hint,
        _ => config.delay(),
    }
}

/// Sleep in `poll` increments so shutdown interrupts the wait promptly
fn wait(source: &Weak<SourceInner>, delay: Duration, poll: Duration) {
    let deadline = Instant::now() + delay;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }

        match source.upgrade() {
            Some(inner) if inner.flags.should_retry() => {}
            _ => return,
        }

        thread::sleep(poll.min(deadline - now));
    }
}
