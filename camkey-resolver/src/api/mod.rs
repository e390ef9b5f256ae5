//! HTTP API
//!
//! - `POST /lookup` - the overlay's lookup message
//! - `POST|DELETE /api/settings/getsongbpm_api_key` - credential management
//! - `GET /health` - liveness and queue depth

pub mod health;
pub mod lookup;
pub mod settings;

pub use health::health_routes;
pub use lookup::lookup_routes;
pub use settings::settings_routes;
