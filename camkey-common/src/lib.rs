//! # camkey common library
//!
//! Shared code for the camkey key resolver:
//! - Error type and result alias
//! - Bootstrap configuration (TOML) and root folder resolution
//! - SQLite initialization (settings and key cache tables)
//! - The resolved-key data model and the lookup message contract

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod model;

pub use error::{Error, Result};
pub use model::{
    cache_key, CamelotCode, KeyMatch, KeyOutcome, LookupMessage, LookupRequest, LookupResponse,
    MissDiagnostics, Mode, Provider, ResolvedKey,
};
