//! Per-query resource limits and cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum length in bytes of a regex query (4096)
pub const MAX_REGEX_LEN: usize = 4096;

/// Maximum number of productions in a grammar query (10000)
pub const MAX_PRODUCTIONS: usize = 10_000;

/// Upper bound for a configured iteration cap (2^40)
pub const MAX_ITERATION_CAP: u64 = 1 << 40;

/// Limits applied to a single query invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLimits {
    /// Maximum fixpoint/worklist iterations (None = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,

    /// Wall-clock budget for the query (None = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl QueryLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of loop iterations
    pub fn with_max_iterations(mut self, max: u64) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Cap the wall-clock time spent in the query
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(max) = self.max_iterations {
            if max == 0 || max > MAX_ITERATION_CAP {
                return Err(Error::Validation(format!(
                    "max_iterations must be in 1..={} (got {})",
                    MAX_ITERATION_CAP, max
                )));
            }
        }
        Ok(())
    }
}

/// Handle used to cancel a running query from another thread
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-query execution state shared by every solver loop.
///
/// A context is created for one query and dropped with it. Solvers call
/// [`QueryContext::tick`] once per fixpoint round or worklist item.
#[derive(Debug)]
pub struct QueryContext {
    limits: QueryLimits,
    cancel: Option<CancellationToken>,
    started: Instant,
    iterations: u64,
}

impl QueryContext {
    pub fn new(limits: QueryLimits) -> Self {
        Self {
            limits,
            cancel: None,
            started: Instant::now(),
            iterations: 0,
        }
    }

    /// Context without limits
    pub fn unbounded() -> Self {
        Self::new(QueryLimits::default())
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Count one unit of work and check every limit
    pub fn tick(&mut self) -> Result<()> {
        self.iterations += 1;

        if let Some(max) = self.limits.max_iterations {
            if self.iterations > max {
                return Err(Error::LimitExceeded {
                    iterations: self.iterations,
                    max,
                });
            }
        }

        if let Some(token) = &self.cancel {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }

        // Clock reads are cheap but not free; sample every 64 iterations.
        if self.iterations % 64 == 1 {
            if let Some(timeout) = self.limits.timeout {
                if self.started.elapsed() > timeout {
                    return Err(Error::Timeout(timeout));
                }
            }
        }

        Ok(())
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_cap() {
        let mut ctx = QueryContext::new(QueryLimits::new().with_max_iterations(3));
        assert!(ctx.tick().is_ok());
        assert!(ctx.tick().is_ok());
        assert!(ctx.tick().is_ok());
        assert!(matches!(
            ctx.tick(),
            Err(Error::LimitExceeded { iterations: 4, max: 3 })
        ));
    }

    #[test]
    fn test_cancellation() {
        let token = CancellationToken::new();
        let mut ctx = QueryContext::unbounded().with_cancellation(token.clone());
        assert!(ctx.tick().is_ok());
        token.cancel();
        assert!(matches!(ctx.tick(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_zero_timeout() {
        let mut ctx = QueryContext::new(QueryLimits::new().with_timeout(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(1));
        assert!(matches!(ctx.tick(), Err(Error::Timeout(_))));
    }

    #[test]
    fn test_validate_limits() {
        assert!(QueryLimits::new().validate().is_ok());
        assert!(QueryLimits::new().with_max_iterations(0).validate().is_err());
        assert!(QueryLimits::new().with_max_iterations(10).validate().is_ok());
    }
}
