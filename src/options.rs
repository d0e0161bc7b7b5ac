//! Job configuration.

use crate::safety::ResourceLimits;

/// Length assumed for random-access formats when the real length is not
/// known.
pub const DEFAULT_UNKNOWN_SIZE_ESTIMATE: u64 = 2048;

/// Options for an explosion job.
///
/// # Example
///
/// ```rust
/// use exploder::{ExplodeOptions, ResourceLimits};
///
/// let options = ExplodeOptions::new()
///     .max_depth(Some(3))
///     .limits(ResourceLimits::strict());
/// assert_eq!(options.max_depth, Some(3));
/// assert_eq!(options.unknown_size_estimate, 2048);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplodeOptions {
    /// How many archive layers to open. `None` opens every layer; `Some(0)`
    /// writes the input as is.
    pub max_depth: Option<u32>,
    /// Length assumed by random-access decoders when the declared size is
    /// missing or unreliable. Clamped to the bytes actually available.
    pub unknown_size_estimate: u64,
    /// Resource ceilings.
    pub limits: ResourceLimits,
}

impl Default for ExplodeOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            unknown_size_estimate: DEFAULT_UNKNOWN_SIZE_ESTIMATE,
            limits: ResourceLimits::unlimited(),
        }
    }
}

impl ExplodeOptions {
    /// Creates options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the depth budget.
    pub fn max_depth(mut self, depth: Option<u32>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the length assumed for unsized random-access inputs.
    pub fn unknown_size_estimate(mut self, estimate: u64) -> Self {
        self.unknown_size_estimate = estimate;
        self
    }

    /// Sets the resource ceilings.
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }
}
