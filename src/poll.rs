//! Bounded, cancellable polling with exponential backoff.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
    /// Wall-clock budget for the whole poll, measured from the first probe.
    pub deadline: Duration,
    /// Spread each delay by up to ±20% so concurrent pollers drift apart.
    pub jitter: bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_attempts: 30,
            deadline: Duration::from_secs(300),
            jitter: true,
        }
    }
}

impl PollPolicy {
    /// Delay before probe `attempt + 1`, without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis.min(self.max_delay.as_millis() as f64) as u64)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let spread = rand::thread_rng().gen_range(0.8..1.2);
        delay.mul_f64(spread).min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PollError<E> {
    #[error("polling cancelled")]
    Cancelled,
    #[error("gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error("deadline exceeded after {attempts} attempts")]
    DeadlineExceeded { attempts: u32 },
    #[error("probe failed: {0}")]
    Probe(E),
}

/// What a single probe observed.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    Ready(T),
    Pending,
}

/// Cloneable cancellation signal shared between a poller and whoever may abort it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: std::sync::Arc::new(tx), rx }
    }
}

impl CancelHandle {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // Sender lives in self, so wait_for only ends on cancellation.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Probe until it reports `Ready`, a probe errors, or the policy runs out.
///
/// Probe errors end the poll immediately; transient failures should be mapped
/// to `Probe::Pending` by the caller if they are worth waiting out.
pub async fn poll_until<T, E, F, Fut>(
    policy: &PollPolicy,
    cancel: &CancelHandle,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Probe<T>, E>>,
{
    let started = Instant::now();
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        attempt += 1;
        match probe(attempt).await.map_err(PollError::Probe)? {
            Probe::Ready(value) => return Ok(value),
            Probe::Pending => debug!(attempt, "poll target not ready"),
        }
        if attempt >= policy.max_attempts {
            return Err(PollError::Exhausted { attempts: attempt });
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.deadline {
            return Err(PollError::DeadlineExceeded { attempts: attempt });
        }
        let delay = policy.jittered(policy.delay_for(attempt)).min(policy.deadline - elapsed);

        tokio::select! {
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        if started.elapsed() >= policy.deadline {
            return Err(PollError::DeadlineExceeded { attempts: attempt });
        }
    }
}
