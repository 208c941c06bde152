use edugraph_core::TutorConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backends for the completion service. All of them
/// speak the OpenAI chat-completions protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    /// A model server on this machine (LM Studio, llama.cpp, Ollama, ...).
    Local,
    OpenAI,
    Gemini,
}

impl Provider {
    fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Local => "http://localhost:1234/v1",
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub graph_database_url: String,
    pub progress_path: PathBuf,
    pub provider: Provider,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub chat_model: String,
    pub llm_timeout: Duration,
    pub teaching_temperature: f32,
    pub log_level: Level,
    pub prompts_path: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let graph_database_url = std::env::var("GRAPH_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://edugraph.db".to_string());

        let progress_path = std::env::var("PROGRESS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("student_progress.json"));

        let provider_str = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "local".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "local" => Provider::Local,
            "openai" => Provider::OpenAI,
            "gemini" => Provider::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{}' is not one of local, openai, gemini", other),
                ));
            }
        };

        let llm_base_url = std::env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| provider.default_base_url().to_string());

        let llm_api_key = match (std::env::var("LLM_API_KEY").ok(), &provider) {
            (Some(key), _) => key,
            (None, Provider::Local) => "lm-studio".to_string(),
            (None, _) => {
                return Err(ConfigError::MissingVar(format!(
                    "LLM_API_KEY must be set for '{}' provider",
                    provider_str.to_lowercase()
                )));
            }
        };

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "local-model".to_string());

        let timeout_str = std::env::var("LLM_TIMEOUT_SECS").unwrap_or_else(|_| "60".to_string());
        let llm_timeout = match timeout_str.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                return Err(ConfigError::InvalidValue(
                    "LLM_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                ));
            }
        };

        let temperature_str =
            std::env::var("TEACHING_TEMPERATURE").unwrap_or_else(|_| "0.3".to_string());
        let teaching_temperature = match temperature_str.parse::<f32>() {
            Ok(t) if (0.0..=2.0).contains(&t) => t,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "TEACHING_TEMPERATURE".to_string(),
                    format!("'{}' is not a temperature between 0 and 2", temperature_str),
                ));
            }
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        Ok(Self {
            graph_database_url,
            progress_path,
            provider,
            llm_base_url,
            llm_api_key,
            chat_model,
            llm_timeout,
            teaching_temperature,
            log_level,
            prompts_path,
        })
    }

    /// Session settings derived from this configuration.
    pub fn tutor_config(&self) -> TutorConfig {
        TutorConfig {
            teaching_temperature: self.teaching_temperature,
            ..TutorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("GRAPH_DATABASE_URL");
            env::remove_var("PROGRESS_FILE");
            env::remove_var("LLM_PROVIDER");
            env::remove_var("LLM_BASE_URL");
            env::remove_var("LLM_API_KEY");
            env::remove_var("CHAT_MODEL");
            env::remove_var("LLM_TIMEOUT_SECS");
            env::remove_var("TEACHING_TEMPERATURE");
            env::remove_var("RUST_LOG");
            env::remove_var("PROMPTS_PATH");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.graph_database_url, "sqlite://edugraph.db");
        assert_eq!(config.progress_path, PathBuf::from("student_progress.json"));
        assert_eq!(config.provider, Provider::Local);
        assert_eq!(config.llm_base_url, "http://localhost:1234/v1");
        assert_eq!(config.llm_api_key, "lm-studio");
        assert_eq!(config.chat_model, "local-model");
        assert_eq!(config.llm_timeout, Duration::from_secs(60));
        assert_eq!(config.teaching_temperature, 0.3);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, PathBuf::from("./prompts"));
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("GRAPH_DATABASE_URL", "sqlite:///tmp/graph.db");
            env::set_var("PROGRESS_FILE", "/tmp/progress.json");
            env::set_var("LLM_PROVIDER", "OpenAI");
            env::set_var("LLM_API_KEY", "custom-openai-key");
            env::set_var("CHAT_MODEL", "gpt-4o-mini");
            env::set_var("LLM_TIMEOUT_SECS", "15");
            env::set_var("TEACHING_TEMPERATURE", "0.7");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.graph_database_url, "sqlite:///tmp/graph.db");
        assert_eq!(config.progress_path, PathBuf::from("/tmp/progress.json"));
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.llm_base_url, "https://api.openai.com/v1");
        assert_eq!(config.llm_api_key, "custom-openai-key");
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.llm_timeout, Duration::from_secs(15));
        assert_eq!(config.tutor_config().teaching_temperature, 0.7);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.prompts_path, PathBuf::from("/custom/prompts"));
    }

    #[test]
    #[serial]
    fn test_config_base_url_override() {
        clear_env_vars();
        unsafe {
            env::set_var("LLM_BASE_URL", "http://127.0.0.1:11434/v1");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.llm_base_url, "http://127.0.0.1:11434/v1");
    }

    #[test]
    #[serial]
    fn test_config_missing_gemini_key() {
        clear_env_vars();
        unsafe {
            env::set_var("LLM_PROVIDER", "gemini");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => {
                assert!(msg.contains("LLM_API_KEY"));
                assert!(msg.contains("gemini"));
            }
            _ => panic!("Expected MissingVar for LLM_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_provider() {
        clear_env_vars();
        unsafe {
            env::set_var("LLM_PROVIDER", "carrier-pigeon");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "LLM_PROVIDER"),
            _ => panic!("Expected InvalidValue for LLM_PROVIDER"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_timeout() {
        clear_env_vars();
        unsafe {
            env::set_var("LLM_TIMEOUT_SECS", "0");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "LLM_TIMEOUT_SECS"),
            _ => panic!("Expected InvalidValue for LLM_TIMEOUT_SECS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }
}
