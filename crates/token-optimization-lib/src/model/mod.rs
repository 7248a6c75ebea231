//! Plain data records shared by the settings store, the engine and the server.

pub mod optimization_config;
pub mod optimization_stats;
