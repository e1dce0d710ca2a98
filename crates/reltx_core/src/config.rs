//! Transaction hierarchy configuration.

/// Configuration for a transaction hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Upper bound on commit/rollback passes caused by handlers that
    /// register further objects while the transaction is committing.
    pub max_reiteration_passes: usize,

    /// Whether to verify bidirectional consistency before a commit is applied.
    pub verify_consistency_on_commit: bool,

    /// Whether lazy end-point lookups also load the contents of freshly
    /// registered virtual end-points.
    pub eager_virtual_load_on_lazy_access: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_reiteration_passes: 64,
            verify_consistency_on_commit: false,
            eager_virtual_load_on_lazy_access: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of commit/rollback passes.
    #[must_use]
    pub const fn max_reiteration_passes(mut self, passes: usize) -> Self {
        self.max_reiteration_passes = passes;
        self
    }

    /// Sets whether commits verify bidirectional consistency first.
    #[must_use]
    pub const fn verify_consistency_on_commit(mut self, value: bool) -> Self {
        self.verify_consistency_on_commit = value;
        self
    }

    /// Sets whether lazy lookups eagerly load virtual end-point contents.
    #[must_use]
    pub const fn eager_virtual_load_on_lazy_access(mut self, value: bool) -> Self {
        self.eager_virtual_load_on_lazy_access = value;
        self
    }
}
