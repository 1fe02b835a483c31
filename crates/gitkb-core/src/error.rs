//! Error type for catalog operations.
//!
//! Repository methods return `anyhow::Result`; the errors they raise for
//! client mistakes are [`CatalogError`] values so that frontends can
//! `downcast_ref` and map them (HTTP status, exit code).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("duplicate id: {0}")]
    Duplicate(String),
}

impl CatalogError {
    pub fn asset_not_found(id: impl Into<String>) -> Self {
        CatalogError::NotFound {
            kind: "asset",
            id: id.into(),
        }
    }

    pub fn play_not_found(id: impl Into<String>) -> Self {
        CatalogError::NotFound {
            kind: "play",
            id: id.into(),
        }
    }
}
