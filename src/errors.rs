//! Error taxonomy for the certificate-chain pipeline.
//!
//! Tier-construction failures (`Generation`, `Validity`, `ChainIntegrity`)
//! abort the whole run because every downstream artifact depends on the
//! assembled chain. `Export` and `ExternalTool` are isolated per artifact:
//! the pipeline keeps producing the remaining formats and records the
//! outcome in the final manifest.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// Key or certificate construction failed in the crypto backend.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Requested validity window is not positive. Raised before any key
    /// material is generated.
    #[error("invalid validity window: {days} days (must be positive)")]
    Validity { days: i64 },

    /// A child certificate's signature does not verify under its parent's
    /// public key.
    #[error("chain integrity failure: '{child}' does not verify under '{parent}'")]
    ChainIntegrity { child: String, parent: String },

    /// Per-format serialization or write failure.
    #[error("{format} export to {} failed: {reason}", path.display())]
    Export {
        format: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// The external keystore utility failed or timed out. Non-fatal; the
    /// pipeline records the artifact as degraded.
    #[error("external tool '{tool}' failed: {reason}")]
    ExternalTool { tool: String, reason: String },
}

impl From<openssl::error::ErrorStack> for ChainError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        ChainError::Generation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_message_carries_days() {
        let err = ChainError::Validity { days: -3 };
        assert!(err.to_string().contains("-3 days"));
    }

    #[test]
    fn test_external_tool_message() {
        let err = ChainError::ExternalTool {
            tool: "keytool".to_string(),
            reason: "timed out".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("keytool"));
        assert!(msg.contains("timed out"));
    }
}
