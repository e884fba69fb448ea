//! Waits on console state transitions
//!
//! Each wait supplies its own probe to [`wait_for`] and decides which lookup outcomes
//! complete the wait, keep it polling, or abort it.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::model::ServiceDeploymentStatus;
use crate::client::ApiError;
use crate::wait::{wait_for, Context, WaitError};

/// Polling interval and overall timeout of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitSettings {
    pub const CLUSTER_DELETION: Self = Self::new(Duration::from_secs(10), Duration::from_secs(600));
    pub const STACK_DELETION: Self = Self::new(Duration::from_secs(10), Duration::from_secs(1800));
    pub const SERVICE_DELETION: Self = Self::new(Duration::from_secs(5), Duration::from_secs(600));
    pub const SERVICE_HEALTH: Self = Self::new(Duration::from_secs(5), Duration::from_secs(600));

    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Wait until `lookup` reports that the object does not exist anymore
///
/// A lookup failing with [`ApiError::NotFound`] completes the wait,
/// a successful lookup keeps polling, and any other error aborts the wait.
pub async fn wait_for_deletion<F, Fut, T>(
    ctx: &Context,
    settings: WaitSettings,
    kind: &str,
    id: &str,
    mut lookup: F,
) -> Result<(), WaitError<ApiError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let ctx = ctx.with_timeout(settings.timeout);
    info!(kind, id, "Waiting for deletion");

    let result = wait_for(&ctx, settings.interval, |_| {
        let lookup = lookup();
        async move {
            match lookup.await {
                Ok(_) => {
                    debug!(kind, id, "Still present");
                    Ok(false)
                }
                Err(err) if err.is_not_found() => Ok(true),
                Err(err) => Err(err),
            }
        }
    })
    .await;

    match &result {
        Ok(()) => info!(kind, id, "Deleted"),
        Err(err) => warn!(kind, id, error = %err, "Failed waiting for deletion"),
    }
    result
}

/// Wait until `status` reports the service deployment as healthy
///
/// Lookup errors are considered transient: they are logged and the wait keeps polling
/// until the timeout.
pub async fn wait_for_healthy<F, Fut>(
    ctx: &Context,
    settings: WaitSettings,
    id: &str,
    mut status: F,
) -> Result<(), WaitError<ApiError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ServiceDeploymentStatus, ApiError>>,
{
    let ctx = ctx.with_timeout(settings.timeout);
    info!(id, "Waiting for service deployment to become healthy");

    let result = wait_for(&ctx, settings.interval, |_| {
        let status = status();
        async move {
            match status.await {
                Ok(ServiceDeploymentStatus::Healthy) => Ok::<_, ApiError>(true),
                Ok(status) => {
                    debug!(id, %status, "Service deployment not healthy yet");
                    Ok(false)
                }
                Err(err) => {
                    debug!(id, error = %err, "Could not get service deployment status, retrying");
                    Ok(false)
                }
            }
        }
    })
    .await;

    match &result {
        Ok(()) => info!(id, "Service deployment is healthy"),
        Err(err) => warn!(id, error = %err, "Failed waiting for service deployment health"),
    }
    result
}
