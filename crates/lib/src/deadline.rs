//! Cooperative time budget shared by every call in an operation tree.
//!
//! A [`Deadline`] is an absolute instant copied by value into each nested
//! call. Callees derive their remaining time from it and never extend it.
//! Expiry is observed at the start of work and at join points; work that is
//! already in flight is allowed to finish.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// The budget ran out before an operation could start or continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("deadline exceeded before {operation} (budget was {budget:?})")]
pub struct DeadlineExceeded {
  /// What was about to run when expiry was observed.
  pub operation: String,
  /// Total budget the deadline was created with.
  pub budget: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
  at: Instant,
  budget: Duration,
}

impl Deadline {
  /// Create a deadline `budget` from now.
  pub fn after(budget: Duration) -> Self {
    Self {
      at: Instant::now() + budget,
      budget,
    }
  }

  /// Time left before expiry, saturating at zero.
  pub fn remaining(&self) -> Duration {
    self.at.saturating_duration_since(Instant::now())
  }

  pub fn is_expired(&self) -> bool {
    Instant::now() >= self.at
  }

  /// The total budget this deadline was created with.
  pub fn budget(&self) -> Duration {
    self.budget
  }

  /// Fail with [`DeadlineExceeded`] if the budget is already spent.
  pub fn check(&self, operation: &str) -> Result<(), DeadlineExceeded> {
    if self.is_expired() {
      return Err(DeadlineExceeded {
        operation: operation.to_string(),
        budget: self.budget,
      });
    }
    Ok(())
  }

  /// Await `future`, failing with [`DeadlineExceeded`] if it outlives the budget.
  pub async fn bound<F: Future>(&self, operation: &str, future: F) -> Result<F::Output, DeadlineExceeded> {
    tokio::time::timeout_at(self.at, future).await.map_err(|_| DeadlineExceeded {
      operation: operation.to_string(),
      budget: self.budget,
    })
  }
}
