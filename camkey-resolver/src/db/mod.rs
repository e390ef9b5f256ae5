//! Database access for camkey-resolver

pub mod settings;
