//! Port traits the domain depends on; adapters implement them.

pub mod config_port;
pub mod series_port;
pub mod session_catalog_port;
pub mod session_store_port;
