//! Engine error taxonomy.
//!
//! Only conditions a caller must branch on live here. Policy fallback
//! (unknown tier resolving to free) and lost transition races are recovered
//! silently and never surface as errors; quota accounting failures fail
//! open inside the quota tracker.

use thiserror::Error;

use crate::tier::Tier;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Persistence or market-feed collaborator unreachable. Retryable; the
    /// engine never fabricates signal data in its place.
    #[error("upstream unavailable: {detail}")]
    UpstreamUnavailable { detail: String },

    /// Historical export requested by a tier without export rights.
    #[error("history export not permitted for tier '{tier}'")]
    ExportNotPermitted { tier: Tier },
}

impl EngineError {
    pub fn upstream(detail: impl Into<String>) -> Self {
        EngineError::UpstreamUnavailable {
            detail: detail.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::UpstreamUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(EngineError::upstream("store timeout").is_retryable());
        assert!(!EngineError::ExportNotPermitted { tier: Tier::Basic }.is_retryable());
    }

    #[test]
    fn test_display_names_tier() {
        let err = EngineError::ExportNotPermitted { tier: Tier::Pro };
        assert!(err.to_string().contains("pro"));
    }
}
