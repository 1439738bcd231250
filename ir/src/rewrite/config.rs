//! Rewrite driver configuration.
//!
//! Built explicitly with the bon builder, or from environment variables.

use bon::bon;

/// Bounds and housekeeping for [`GraphRewrite`](super::GraphRewrite) passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteConfig {
    /// Restarts a pass may take before it is considered divergent.
    pub max_iterations: usize,
    /// Upper bound on iterations a recurrent matcher follows.
    pub max_recurrent_iterations: usize,
    /// Reclaim unreachable nodes after each replacement.
    pub sweep_dead_nodes: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self { max_iterations: 64, max_recurrent_iterations: 1024, sweep_dead_nodes: true }
    }
}

#[bon]
impl RewriteConfig {
    #[builder]
    pub fn builder(
        #[builder(default = 64)] max_iterations: usize,
        #[builder(default = 1024)] max_recurrent_iterations: usize,
        #[builder(default = true)] sweep_dead_nodes: bool,
    ) -> Self {
        Self { max_iterations, max_recurrent_iterations, sweep_dead_nodes }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `KILN_REWRITE_MAX_ITERS` - Restart bound per pass (default: 64)
    /// * `KILN_RECURRENT_MAX_ITERS` - Recurrent match bound (default: 1024)
    /// * `KILN_NO_SWEEP` - Keep dead nodes if set
    pub fn from_env() -> Self {
        let max_iterations = std::env::var("KILN_REWRITE_MAX_ITERS").ok().and_then(|s| s.parse().ok()).unwrap_or(64);
        let max_recurrent_iterations =
            std::env::var("KILN_RECURRENT_MAX_ITERS").ok().and_then(|s| s.parse().ok()).unwrap_or(1024);
        let sweep_dead_nodes = std::env::var("KILN_NO_SWEEP").is_err();

        Self { max_iterations, max_recurrent_iterations, sweep_dead_nodes }
    }
}
