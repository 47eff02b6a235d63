use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Settings {
    pub(super) backend: BackendSettings,
    pub(super) exam: ExamSettings,
    pub(super) runtime: RuntimeSettings,
    pub(super) telemetry: TelemetrySettings,
}

/// Connection parameters for the hosted backend platform (REST tables,
/// auth endpoint and serverless functions share one base URL).
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub(crate) base_url: String,
    pub(crate) anon_key: String,
    pub(crate) request_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ExamSettings {
    pub(crate) answer_debounce_ms: u64,
    pub(crate) warning_visible_seconds: u64,
    pub(crate) max_focus_violations: u32,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required secret: {0}")]
    MissingSecret(&'static str),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}
