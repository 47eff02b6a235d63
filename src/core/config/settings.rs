use super::parsing::{env_optional, env_or_default, parse_bool, parse_environment, parse_u32, parse_u64};
use super::types::{
    BackendSettings, ConfigError, ExamSettings, RuntimeSettings, Settings, TelemetrySettings,
};
#[cfg(test)]
use super::types::Environment;

#[cfg(test)]
impl Settings {
    pub(crate) fn test_defaults() -> Self {
        Self {
            backend: BackendSettings {
                base_url: "http://localhost:54321".to_string(),
                anon_key: "test-anon-key".to_string(),
                request_timeout_seconds: 5,
            },
            exam: ExamSettings {
                answer_debounce_ms: 1500,
                warning_visible_seconds: 5,
                max_focus_violations: 3,
            },
            runtime: RuntimeSettings { environment: Environment::Test, strict_config: false },
            telemetry: TelemetrySettings { log_level: "debug".to_string(), json: false },
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        // Missing .env is fine; real deployments set process env directly.
        let _ = dotenvy::dotenv();

        let environment =
            parse_environment(env_optional("AULA_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("AULA_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let base_url = env_or_default("AULA_BACKEND_URL", "http://localhost:54321");
        let anon_key = env_or_default("AULA_ANON_KEY", "");
        let request_timeout_seconds = parse_u64(
            "AULA_REQUEST_TIMEOUT_SECONDS",
            env_or_default("AULA_REQUEST_TIMEOUT_SECONDS", "30"),
        )?;

        let answer_debounce_ms = parse_u64(
            "AULA_ANSWER_DEBOUNCE_MS",
            env_or_default("AULA_ANSWER_DEBOUNCE_MS", "1500"),
        )?;
        let warning_visible_seconds = parse_u64(
            "AULA_WARNING_VISIBLE_SECONDS",
            env_or_default("AULA_WARNING_VISIBLE_SECONDS", "5"),
        )?;
        let max_focus_violations = parse_u32(
            "AULA_MAX_FOCUS_VIOLATIONS",
            env_or_default("AULA_MAX_FOCUS_VIOLATIONS", "3"),
        )?;

        let log_level = env_or_default("AULA_LOG_LEVEL", "info");
        let json = env_optional("AULA_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            backend: BackendSettings { base_url, anon_key, request_timeout_seconds },
            exam: ExamSettings {
                answer_debounce_ms,
                warning_visible_seconds,
                max_focus_violations,
            },
            runtime: RuntimeSettings { environment, strict_config },
            telemetry: TelemetrySettings { log_level, json },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn backend(&self) -> &BackendSettings {
        &self.backend
    }

    pub fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "AULA_BACKEND_URL",
                value: self.backend.base_url.clone(),
            });
        }
        if self.backend.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AULA_REQUEST_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }
        if self.exam.answer_debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AULA_ANSWER_DEBOUNCE_MS",
                value: "0".to_string(),
            });
        }
        if self.exam.max_focus_violations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AULA_MAX_FOCUS_VIOLATIONS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.backend.anon_key.is_empty() {
            return Err(ConfigError::MissingSecret("AULA_ANON_KEY"));
        }

        Ok(())
    }
}
