//! Validator configuration
//!
//! Level 4 - Utilities and configuration

/// How many replicas to run and how
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Number of independent re-simulations
    pub replicas: usize,
    /// Run replicas on the rayon pool
    pub parallel: bool,
    /// Agreeing replicas needed to accept a batch
    pub quorum: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            replicas: 3,
            parallel: true,
            quorum: 2,
        }
    }
}

impl ValidatorConfig {
    /// Set replica count (at least one)
    pub fn with_replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas.max(1);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the K in K-of-N
    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum;
        self
    }
}
