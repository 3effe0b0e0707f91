use std::time::{Duration, Instant};

use crate::stop_control::StopControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
    Stopped,
}

/// Polls `condition` until it holds, the timeout elapses or a stop is requested.
pub fn wait_until(
    stop: &StopControl,
    timeout: Option<Duration>,
    poll: Duration,
    mut condition: impl FnMut() -> bool,
) -> WaitOutcome {
    let started = Instant::now();
    loop {
        if stop.is_stopped() {
            return WaitOutcome::Stopped;
        }
        if condition() {
            return WaitOutcome::Satisfied;
        }
        let chunk = match timeout {
            Some(limit) => {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    return WaitOutcome::TimedOut;
                }
                (limit - elapsed).min(poll)
            }
            None => poll,
        };
        if !stop.sleep_interruptible(chunk, poll) {
            return WaitOutcome::Stopped;
        }
    }
}
