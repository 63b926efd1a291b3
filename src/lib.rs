// Library exports for kith
// This allows integration tests and the binary to share modules

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod identity;
pub mod relationships;
pub mod routes;
pub mod state;
pub mod store;
