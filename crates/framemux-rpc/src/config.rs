use std::time::Duration;

/// Default prefix prepended to every operation path.
pub const DEFAULT_BASE_PATH: &str = "/";

/// Controls client-side invocation behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokerConfig {
    /// Prefix for `:path`, e.g. `/` yields `/namespace/operation`.
    pub base_path: String,
    /// Per-call deadline for the response. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            timeout: None,
        }
    }
}
