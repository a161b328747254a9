//! Workflow configuration
//!
//! Everything the workflow needs is passed in explicitly here; there is
//! no process-wide settings singleton to fall back on.

use std::sync::Arc;
use std::time::Duration;

use crate::reasoning::ReasoningClient;
use crate::tools::Tool;

/// Default cap on reasoning rounds within one `run()` call.
pub const DEFAULT_MAX_ROUNDS: usize = 5;

/// Recommended wall-clock timeout for a full query turn, applied by the
/// caller around `run()`.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for constructing a [`RouterWorkflow`].
///
/// [`RouterWorkflow`]: crate::workflow::RouterWorkflow
pub struct WorkflowConfig {
    pub reasoning: Arc<dyn ReasoningClient>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub max_rounds: usize,
}

impl WorkflowConfig {
    pub fn new(reasoning: Arc<dyn ReasoningClient>, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            reasoning,
            tools,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}
