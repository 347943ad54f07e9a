/// Failures reported by a provider plugin
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    /// The plugin lost or never received its installation; reinstalling fixes it
    #[error("plugin not installed: {0}")]
    NotInstalled(String),

    #[error("capability not implemented: {0}")]
    NotImplemented(String),

    #[error("invalid request: {0}")]
    InvalidClientRequest(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("provider call timed out: {0}")]
    Timeout(String),
}

impl PluginError {
    pub fn not_implemented(capability: impl Into<String>) -> Self {
        Self::NotImplemented(capability.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotInstalled(_) | Self::RateLimited(_) | Self::Upstream(_) | Self::Timeout(_)
        )
    }
}

pub type PluginResult<T> = Result<T, PluginError>;
