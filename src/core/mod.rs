pub mod config;
pub mod telemetry;
pub(crate) mod time;
