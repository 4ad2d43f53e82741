//! Bounded exponential backoff for transient backend errors.

use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::backend::{BackendError, BackendRequest, BackendResponse, ProvisioningBackend};

use super::types::OperationError;

/// How a single operation is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
  /// Total attempts, including the first. Zero is treated as one.
  pub max_attempts: u32,
  pub initial_delay: Duration,
  pub multiplier: f64,
  pub max_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 4,
      initial_delay: Duration::from_millis(200),
      multiplier: 2.0,
      max_delay: Duration::from_secs(5),
    }
  }
}

impl RetryPolicy {
  /// A policy that never waits, for tests and dry environments.
  pub fn immediate(max_attempts: u32) -> Self {
    Self {
      max_attempts,
      initial_delay: Duration::ZERO,
      multiplier: 1.0,
      max_delay: Duration::ZERO,
    }
  }

  pub fn no_retry() -> Self {
    Self::immediate(1)
  }

  /// Delay before retry number `retry` (0 for the first retry).
  pub fn delay_for(&self, retry: u32) -> Duration {
    let factor = self.multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
    let delay = self.initial_delay.as_secs_f64() * factor;
    Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
  }

  /// Run `request` against `backend`, retrying transient failures.
  ///
  /// Returns the response together with the number of attempts made.
  pub async fn execute(
    &self,
    backend: &dyn ProvisioningBackend,
    request: &BackendRequest,
  ) -> Result<(BackendResponse, u32), OperationError> {
    let max_attempts = self.max_attempts.max(1);
    let mut attempt = 0;

    loop {
      attempt += 1;
      match backend.execute(request).await {
        Ok(response) => return Ok((response, attempt)),
        Err(BackendError::Permanent(message)) => {
          return Err(OperationError::Permanent { attempts: attempt, message });
        }
        Err(err @ BackendError::Transient(_)) => {
          if attempt >= max_attempts {
            return Err(OperationError::OperationFailed {
              attempts: attempt,
              last: err,
            });
          }
          let delay = self.delay_for(attempt - 1);
          warn!(
            node = %request.node_id,
            attempt,
            max_attempts,
            delay = ?delay,
            error = %err,
            "transient backend error, retrying"
          );
          sleep(delay).await;
        }
      }
    }
  }
}
