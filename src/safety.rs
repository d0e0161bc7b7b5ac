//! Resource limits for explosion jobs.
//!
//! Archives nest, and a small input can expand without bound. The limits
//! here cap what a job consumes: memory held by peek buffers before commit,
//! bytes handed to the sink, the number of entries visited, and how deep
//! the recursion goes.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::Error;

/// Resource ceilings for one job.
///
/// Every limit is optional; the default is [`ResourceLimits::unlimited()`],
/// which matches the behavior of an unconfigured job.
///
/// # Example
///
/// ```rust
/// use exploder::ResourceLimits;
///
/// let limits = ResourceLimits::strict().max_entries(Some(10_000));
/// assert_eq!(limits.max_entries, Some(10_000));
/// assert!(limits.max_total_bytes.is_some());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceLimits {
    /// Bytes a peek stream may buffer before it is committed.
    ///
    /// A probe that needs more behaves as if the stream were too short.
    pub max_peek_buffer: Option<u64>,
    /// Bytes written to the sink across the whole job. Exceeding it is fatal.
    pub max_total_bytes: Option<u64>,
    /// Entries visited across the whole job. Iteration stops when reached.
    pub max_entries: Option<u64>,
    /// Archives open at once along one path. A stream found at this nesting
    /// level is written verbatim instead of being identified.
    pub max_nesting: Option<u32>,
}

impl ResourceLimits {
    /// Creates limits with no restrictions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates limits with no restrictions.
    pub fn unlimited() -> Self {
        Self {
            max_peek_buffer: None,
            max_total_bytes: None,
            max_entries: None,
            max_nesting: None,
        }
    }

    /// Creates conservative limits for untrusted input.
    ///
    /// | Limit | Value |
    /// |-------|-------|
    /// | `max_peek_buffer` | 256 MiB |
    /// | `max_total_bytes` | 64 GiB |
    /// | `max_entries` | 1,000,000 |
    /// | `max_nesting` | 64 |
    pub fn strict() -> Self {
        Self {
            max_peek_buffer: Some(256 << 20),
            max_total_bytes: Some(64 << 30),
            max_entries: Some(1_000_000),
            max_nesting: Some(64),
        }
    }

    /// Sets the peek buffer ceiling.
    pub fn max_peek_buffer(mut self, max: Option<u64>) -> Self {
        self.max_peek_buffer = max;
        self
    }

    /// Sets the total output ceiling.
    pub fn max_total_bytes(mut self, max: Option<u64>) -> Self {
        self.max_total_bytes = max;
        self
    }

    /// Sets the entry count ceiling.
    pub fn max_entries(mut self, max: Option<u64>) -> Self {
        self.max_entries = max;
        self
    }

    /// Sets the nesting ceiling.
    pub fn max_nesting(mut self, max: Option<u32>) -> Self {
        self.max_nesting = max;
        self
    }
}

/// A reader that charges every byte it yields against a shared budget.
///
/// All sink writes of a job share one counter. Once the counter passes the
/// ceiling, reads fail with [`Error::ResourceLimitExceeded`] wrapped in an
/// `io::Error`.
pub struct BudgetReader<R> {
    inner: R,
    total: Arc<AtomicU64>,
    max_total: Option<u64>,
}

impl<R> BudgetReader<R> {
    /// Wraps `inner`, charging against `total`.
    pub fn new(inner: R, total: Arc<AtomicU64>, max_total: Option<u64>) -> Self {
        Self {
            inner,
            total,
            max_total,
        }
    }
}

impl<R: Read> Read for BudgetReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        let total = self.total.fetch_add(n as u64, Ordering::Relaxed) + n as u64;
        if let Some(max) = self.max_total {
            if total > max {
                return Err(io::Error::other(Error::ResourceLimitExceeded(format!(
                    "total output {total} exceeds limit {max}"
                ))));
            }
        }
        Ok(n)
    }
}

impl<R> std::fmt::Debug for BudgetReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetReader")
            .field("total", &self.total.load(Ordering::Relaxed))
            .field("max_total", &self.max_total)
            .finish_non_exhaustive()
    }
}
