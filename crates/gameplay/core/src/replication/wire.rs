//! Binary encoding of snapshots.

use sha2::{Digest, Sha256};

use super::ContainerSnapshot;
use crate::error::{ErrorSeverity, GameplayError};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    #[error("failed to decode snapshot: {0}")]
    Decode(String),
}

impl GameplayError for WireError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Encode(_) => ErrorSeverity::Internal,
            Self::Decode(_) => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Encode(_) => "WIRE_ENCODE_FAILED",
            Self::Decode(_) => "WIRE_DECODE_FAILED",
        }
    }
}

impl ContainerSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        bincode::serialize(self).map_err(|e| WireError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        bincode::deserialize(bytes).map_err(|e| WireError::Decode(e.to_string()))
    }

    /// SHA-256 of the encoded snapshot. Two peers holding equal state
    /// produce equal digests.
    pub fn digest(&self) -> Result<[u8; 32], WireError> {
        let bytes = self.encode()?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hasher.finalize().into())
    }
}
