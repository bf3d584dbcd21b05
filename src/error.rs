//! Typed error kinds shared across module boundaries.
//!
//! Most fallible code in this crate returns `anyhow::Result` with `.context(...)`
//! annotations. The handful of call sites that need to match on *kind* rather than
//! message (the record store, the filter engine, the rate limiter) return
//! `VarroaError` instead, which converts into `anyhow::Error` at the seam.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VarroaError {
    #[error("duplicate entry")]
    Duplicate,

    #[error("not found")]
    NotFound,

    #[error("rate limit exhausted")]
    RateLimited,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl VarroaError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, VarroaError::Duplicate)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VarroaError::NotFound)
    }
}
