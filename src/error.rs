//! Error types shared across the registry library

use thiserror::Error;

use crate::schema::Violations;

/// Errors surfaced by the registry library.
///
/// Network failures during reconciliation are captured per token and never
/// escape as this type; it is returned only from operations that act on the
/// document as a whole.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The document broke one or more schema rules.
    #[error("token list failed schema validation:\n{0}")]
    Schema(Violations),

    /// JSON-RPC transport or protocol failure.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// A contract returned data that could not be ABI-decoded.
    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    /// No RPC endpoint is known for the chain.
    #[error("chain ID {0} not supported")]
    UnsupportedChain(u64),

    /// An editor operation was rejected.
    #[error("{0}")]
    Edit(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<Violations> for RegistryError {
    fn from(violations: Violations) -> Self {
        RegistryError::Schema(violations)
    }
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
