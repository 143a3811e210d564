// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry with exponential backoff.
//!
//! Teardown after a resource is deleted only runs from the delete watcher.
//! Nothing requeues it, so a failed attempt is retried here until it succeeds.

use crate::errors::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Initial retry interval (1 second)
const INITIAL_INTERVAL_SECS: u64 = 1;

/// Maximum interval between retries (60 seconds)
const MAX_INTERVAL_SECS: u64 = 60;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: u32 = 2;

/// Doubling backoff capped at a maximum interval.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// Interval returned by the next call to [`ExponentialBackoff::next_backoff`]
    pub current_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(initial_interval: Duration, max_interval: Duration) -> Self {
        Self {
            current_interval: initial_interval.min(max_interval),
            max_interval,
        }
    }

    /// Get the next interval to wait and grow the one after it.
    pub fn next_backoff(&mut self) -> Duration {
        let interval = self.current_interval;
        self.current_interval = interval
            .saturating_mul(BACKOFF_MULTIPLIER)
            .min(self.max_interval);
        interval
    }
}

/// Backoff for teardown retries: 1s, 2s, 4s and so on, capped at 60s.
#[must_use]
pub fn cleanup_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_secs(INITIAL_INTERVAL_SECS),
        Duration::from_secs(MAX_INTERVAL_SECS),
    )
}

/// Run `operation` until it returns `Ok`, sleeping between attempts.
///
/// # Returns
///
/// The number of attempts made.
pub async fn retry_until_ok<F, Fut>(
    mut backoff: ExponentialBackoff,
    mut operation: F,
    operation_name: &str,
) -> u32
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(()) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "Succeeded after retries");
                }
                return attempt;
            }
            Err(e) => {
                let retry_after = backoff.next_backoff();
                warn!(
                    operation = operation_name,
                    attempt,
                    retry_after = ?retry_after,
                    error = %e,
                    "Failed, will retry"
                );
                tokio::time::sleep(retry_after).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
