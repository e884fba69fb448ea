//! Poll-until-condition waiter
//!
//! [`wait_for`] blocks until a probe reports completion, the probe fails,
//! or the [`Context`] it is bound to is cancelled or reaches its deadline.

use std::future::Future;
use std::time::Duration;

use async_stream::stream;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Reason why a [`Context`] is done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ContextError {
    /// The deadline of the context elapsed
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    /// The context was cancelled explicitly
    #[error("context cancelled")]
    Cancelled,
}

/// Cancellation scope with an optional deadline
///
/// Cloning a context is cheap and yields a handle to the same scope.
/// Child contexts created with [`Context::with_deadline`] or [`Context::with_timeout`]
/// are cancelled when their parent is, but cancelling a child leaves the parent untouched.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Create a context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Create a child context that ends at `deadline` at the latest
    ///
    /// The child keeps the deadline of the parent if it is earlier.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Create a child context that ends after `timeout` at the latest
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => Self {
                token: self.token.child_token(),
                deadline: self.deadline,
            },
        }
    }

    /// Cancel the context and all its children
    pub fn cancel(&self) {
        self.token.cancel()
    }

    /// Deadline of the context, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Get the reason why the context is done, or [`None`] if it is still running
    ///
    /// Cancellation takes precedence over the deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            Some(ContextError::Cancelled)
        } else if self
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            Some(ContextError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Check if the context is done
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Wait until the context is done
    ///
    /// # Cancel Safety
    ///
    /// This method is cancel safe.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => ContextError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }
}

/// Error returned by [`wait_for`]
#[derive(Debug, Error)]
pub enum WaitError<E> {
    /// The probe failed
    #[error("{0}")]
    Probe(E),
    /// The deadline elapsed before the condition was met
    #[error("timeout while waiting for condition: context deadline exceeded")]
    DeadlineExceeded,
    /// The context was cancelled before the condition was met
    #[error("wait cancelled before condition was met")]
    Cancelled,
    /// The polling interval is zero
    #[error("polling interval must be greater than zero")]
    InvalidInterval,
}

impl<E> WaitError<E> {
    /// Check if the wait stopped because its context ended
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::DeadlineExceeded | Self::Cancelled)
    }
}

impl<E> From<ContextError> for WaitError<E> {
    fn from(value: ContextError) -> Self {
        match value {
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
            ContextError::Cancelled => Self::Cancelled,
        }
    }
}

/// Stream of ticks spaced by `interval`, bound to `ctx`
///
/// The timer is armed only when the stream is polled, so a consumer that takes time between
/// two ticks never finds ticks queued up. The stream ends as soon as the context is done,
/// and holds no resources once dropped.
pub fn ticks(ctx: &Context, interval: Duration) -> impl Stream<Item = Instant> + Send + '_ {
    stream! {
        loop {
            let ticked = tokio::select! {
                biased;
                _ = ctx.done() => false,
                _ = tokio::time::sleep(interval) => true,
            };
            if !ticked {
                break;
            }
            yield Instant::now();
        }
    }
}

/// Poll `probe` every `interval` until it reports completion
///
/// The first probe happens one full `interval` after the call. Probes never overlap:
/// the next interval starts only once the previous probe returned.
///
/// # Arguments
///
/// * `ctx` - Context bounding the wait
/// * `interval` - Delay between the end of a probe and the start of the next one
/// * `probe` - Returns `Ok(true)` once the condition is met, `Ok(false)` to keep polling,
///   and `Err(_)` to abort the wait
///
/// # Remarks
///
/// A probe in flight when the context ends is not interrupted.
/// The wait returns at the next tick boundary.
pub async fn wait_for<F, Fut, E>(
    ctx: &Context,
    interval: Duration,
    mut probe: F,
) -> Result<(), WaitError<E>>
where
    F: FnMut(Context) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    if interval.is_zero() {
        return Err(WaitError::InvalidInterval);
    }

    let ticks = ticks(ctx, interval);
    tokio::pin!(ticks);

    while ticks.next().await.is_some() {
        if probe(ctx.clone()).await.map_err(WaitError::Probe)? {
            return Ok(());
        }
    }

    Err(ctx.err().unwrap_or(ContextError::Cancelled).into())
}
