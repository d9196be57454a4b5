//! # Conflict Retry
//!
//! Re-runs a whole unit of work when it loses a write race.
//!
//! ## Retry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   attempt() ──► Ok ─────────────────────────────────────► return Ok     │
//! │      │                                                                  │
//! │      ├──► Err (business rule / other failure) ───────────► return Err   │
//! │      │                                                                  │
//! │      └──► Err (write conflict) ──► tries > max? ──yes──► RetriesExhausted│
//! │                                        │                                │
//! │                                        no                               │
//! │                                        ▼                                │
//! │                              sleep(next backoff) ──► attempt() again    │
//! │                                                                         │
//! │  The failed attempt's transaction was dropped, so nothing it wrote     │
//! │  survives. The next attempt re-reads stock from scratch.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LedgerSettings;
use crate::error::{EngineError, EngineResult};

/// Backoff policy for conflicting units of work.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Creates the exponential backoff configuration.
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None, // Bounded by max_retries instead
            ..Default::default()
        }
    }
}

impl From<&LedgerSettings> for RetryPolicy {
    fn from(settings: &LedgerSettings) -> Self {
        RetryPolicy {
            max_retries: settings.max_conflict_retries,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&LedgerSettings::default())
    }
}

/// Runs `attempt` until it succeeds, fails for a non-conflict reason, or
/// has conflicted `max_retries + 1` times.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut attempt: F,
) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut backoff = policy.backoff();
    let mut conflicts = 0u32;

    loop {
        match attempt().await {
            Ok(value) => {
                if conflicts > 0 {
                    debug!(operation, conflicts, "Unit of work committed after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() => {
                conflicts += 1;
                if conflicts > policy.max_retries {
                    warn!(operation, attempts = conflicts, error = %err, "Giving up on conflicting unit of work");
                    return Err(EngineError::RetriesExhausted {
                        operation,
                        attempts: conflicts,
                    });
                }

                let delay = backoff.next_backoff().unwrap_or(policy.max_backoff);
                debug!(operation, attempt = conflicts, ?delay, error = %err, "Write conflict, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
