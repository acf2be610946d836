// ABOUTME: Deadline-bounded polling with interval backoff.
// ABOUTME: Shared by the health probe and container stabilization waits.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::HealthcheckConfig;

/// Outcome of a single polling attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Done(T),
    Retry,
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError<E> {
    #[error("gave up after {attempts} attempts in {elapsed:?}")]
    TimedOut { elapsed: Duration, attempts: u32 },

    #[error(transparent)]
    Aborted(E),
}

/// Polls until an attempt completes or the deadline passes.
///
/// Each attempt is itself bounded by the deadline, so a hung probe cannot
/// stretch the wait. The delay between attempts starts at `interval` and is
/// multiplied by `backoff` up to `max_interval`.
#[derive(Debug, Clone)]
pub struct Waiter {
    deadline: Duration,
    interval: Duration,
    max_interval: Duration,
    backoff: u32,
}

impl Waiter {
    /// Fixed-interval waiter.
    pub fn new(deadline: Duration, interval: Duration) -> Self {
        Self {
            deadline,
            interval,
            max_interval: interval,
            backoff: 1,
        }
    }

    pub fn with_backoff(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval.max(self.interval);
        self.backoff = 2;
        self
    }

    pub fn for_healthcheck(config: &HealthcheckConfig) -> Self {
        Self::new(config.deadline, config.interval).with_backoff(config.max_interval)
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run `attempt` (given the 1-based attempt number) until it returns
    /// `Done`, returns an error, or time runs out.
    pub async fn until<T, E, F, Fut>(&self, mut attempt: F) -> Result<T, WaitError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Attempt<T>, E>>,
    {
        let started = Instant::now();
        let deadline = started + self.deadline;
        let mut delay = self.interval;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match tokio::time::timeout_at(deadline, attempt(attempts)).await {
                Ok(Ok(Attempt::Done(value))) => return Ok(value),
                Ok(Ok(Attempt::Retry)) => {}
                Ok(Err(e)) => return Err(WaitError::Aborted(e)),
                Err(_) => break,
            }

            if Instant::now() + delay >= deadline {
                break;
            }
            tracing::debug!(attempt = attempts, ?delay, "retrying");
            tokio::time::sleep(delay).await;
            delay = (delay * self.backoff).min(self.max_interval);
        }

        Err(WaitError::TimedOut {
            elapsed: started.elapsed(),
            attempts,
        })
    }
}
