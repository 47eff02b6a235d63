mod parsing;
mod settings;
mod types;

pub use types::{
    BackendSettings, ConfigError, Environment, ExamSettings, RuntimeSettings, Settings,
    TelemetrySettings,
};
