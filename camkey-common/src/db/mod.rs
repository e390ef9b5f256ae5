//! Database initialization shared by camkey crates

pub mod init;

pub use init::{create_key_cache_table, create_settings_table, init_database};
