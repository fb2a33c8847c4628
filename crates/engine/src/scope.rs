//! Bounded-duration execution scopes.
//!
//! Every store round trip the engine makes runs inside an [`ExecutionScope`]:
//! a deadline, not a lock. When the deadline passes the in-flight future is
//! dropped and the caller gets [`CoreError::Timeout`]. Dropping is safe because
//! store updates are single atomic units: an uncommitted `sqlx` transaction
//! rolls back on drop, and the memory store applies updates without yielding.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::CoreError;

/// Deadlines applied to engine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Deadline for a single mutation (seconds).
    pub mutation: Duration,
    /// Deadline for aggregation reads (tens of seconds).
    pub aggregation: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            mutation: Duration::from_secs(5),
            aggregation: Duration::from_secs(30),
        }
    }
}

impl Timeouts {
    /// Scope for a mutation.
    #[must_use]
    pub const fn mutation(&self, operation: &'static str) -> ExecutionScope {
        ExecutionScope::new(operation, ScopeKind::Mutation, self.mutation)
    }

    /// Scope for an aggregation or read.
    #[must_use]
    pub const fn aggregation(&self, operation: &'static str) -> ExecutionScope {
        ExecutionScope::new(operation, ScopeKind::Aggregation, self.aggregation)
    }
}

/// What kind of work a scope bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Mutation,
    Aggregation,
}

/// A deadline wrapped around one operation.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionScope {
    operation: &'static str,
    kind: ScopeKind,
    deadline: Duration,
}

impl ExecutionScope {
    /// Create a scope.
    #[must_use]
    pub const fn new(operation: &'static str, kind: ScopeKind, deadline: Duration) -> Self {
        Self {
            operation,
            kind,
            deadline,
        }
    }

    /// The operation name used in logs and timeout errors.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// Drive `work` to completion or fail once the deadline passes.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `work`, or `CoreError::Timeout` if the
    /// deadline expired first.
    pub async fn run<T, F>(self, work: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, CoreError>>,
    {
        let started = Instant::now();
        if let Ok(result) = tokio::time::timeout(self.deadline, work).await {
            tracing::debug!(
                operation = self.operation,
                kind = ?self.kind,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                ok = result.is_ok(),
                "scope closed"
            );
            result
        } else {
            tracing::warn!(
                operation = self.operation,
                kind = ?self.kind,
                deadline = ?self.deadline,
                "deadline exceeded, operation abandoned"
            );
            Err(CoreError::Timeout {
                operation: self.operation,
                after: self.deadline,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let scope = ExecutionScope::new("quick", ScopeKind::Mutation, Duration::from_secs(1));
        let result = scope.run(async { Ok::<_, CoreError>(7) }).await;
        assert!(matches!(result, Ok(7)));
    }

    #[tokio::test]
    async fn test_error_passes_through() {
        let scope = ExecutionScope::new("failing", ScopeKind::Mutation, Duration::from_secs(1));
        let result: Result<(), _> = scope
            .run(async { Err(CoreError::NotFound("user".to_string())) })
            .await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_deadline_exceeded_is_timeout() {
        let scope = ExecutionScope::new("slow", ScopeKind::Aggregation, Duration::from_millis(50));
        let result = scope
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, CoreError>(())
            })
            .await;
        assert!(matches!(
            result,
            Err(CoreError::Timeout {
                operation: "slow",
                ..
            })
        ));
    }

    #[test]
    fn test_timeouts_build_scopes() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.mutation("add").operation(), "add");
        assert!(timeouts.mutation < timeouts.aggregation);
    }
}
