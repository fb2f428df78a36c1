//! Status probe error types.

use oms_state::StateError;
use thiserror::Error;

/// Configuration problems that prevent a probe from being attempted.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("config entry {0} is not set")]
    ConfigMissing(String),

    #[error("config entry {key} is malformed: {value:?} (expected scheme://host:port)")]
    ConfigMalformed { key: String, value: String },

    #[error("config lookup failed: {0}")]
    Lookup(#[from] StateError),
}

pub type ProbeResult<T> = Result<T, ProbeError>;
