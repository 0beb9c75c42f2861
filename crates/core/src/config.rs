use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub chat: ChatConfig,
    pub llm: LlmConfig,
    pub crm: CrmConfig,
    pub memory: MemoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub enabled: bool,
    pub login_url: String,
    pub api_version: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub security_token: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub instance_url: Option<String>,
    pub timeout_secs: u64,
    pub max_records: usize,
    pub max_response_bytes: usize,
    pub max_fields: usize,
}

#[derive(Clone, Debug)]
pub struct MemoryConfig {
    /// Per-conversation message cap. `None` keeps full history for the life
    /// of the process.
    pub max_messages: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub chat_app_token: Option<String>,
    pub chat_bot_token: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub log_level: Option<String>,
    pub crm_enabled: Option<bool>,
    pub crm_username: Option<String>,
    pub crm_password: Option<String>,
    pub crm_security_token: Option<String>,
    pub crm_access_token: Option<String>,
    pub crm_instance_url: Option<String>,
    pub memory_max_messages: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chat: ChatConfig { app_token: String::new().into(), bot_token: String::new().into() },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4.1-mini".to_string(),
                temperature: 0.0,
                timeout_secs: 30,
                max_retries: 2,
            },
            crm: CrmConfig {
                enabled: false,
                login_url: "https://login.salesforce.com".to_string(),
                api_version: "59.0".to_string(),
                username: None,
                password: None,
                security_token: None,
                access_token: None,
                instance_url: None,
                timeout_secs: 30,
                max_records: 100,
                max_response_bytes: 50_000,
                max_fields: 50,
            },
            memory: MemoryConfig { max_messages: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("switchboard.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(chat) = patch.chat {
            if let Some(app_token_value) = chat.app_token {
                self.chat.app_token = secret_value(app_token_value);
            }
            if let Some(bot_token_value) = chat.bot_token {
                self.chat.bot_token = secret_value(bot_token_value);
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(enabled) = crm.enabled {
                self.crm.enabled = enabled;
            }
            if let Some(login_url) = crm.login_url {
                self.crm.login_url = login_url;
            }
            if let Some(api_version) = crm.api_version {
                self.crm.api_version = api_version;
            }
            if let Some(username) = crm.username {
                self.crm.username = Some(username);
            }
            if let Some(password_value) = crm.password {
                self.crm.password = Some(secret_value(password_value));
            }
            if let Some(security_token_value) = crm.security_token {
                self.crm.security_token = Some(secret_value(security_token_value));
            }
            if let Some(access_token_value) = crm.access_token {
                self.crm.access_token = Some(secret_value(access_token_value));
            }
            if let Some(instance_url) = crm.instance_url {
                self.crm.instance_url = Some(instance_url);
            }
            if let Some(timeout_secs) = crm.timeout_secs {
                self.crm.timeout_secs = timeout_secs;
            }
            if let Some(max_records) = crm.max_records {
                self.crm.max_records = max_records;
            }
            if let Some(max_response_bytes) = crm.max_response_bytes {
                self.crm.max_response_bytes = max_response_bytes;
            }
            if let Some(max_fields) = crm.max_fields {
                self.crm.max_fields = max_fields;
            }
        }

        if let Some(memory) = patch.memory {
            if let Some(max_messages) = memory.max_messages {
                self.memory.max_messages = Some(max_messages);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SWITCHBOARD_CHAT_APP_TOKEN") {
            self.chat.app_token = secret_value(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_CHAT_BOT_TOKEN") {
            self.chat.bot_token = secret_value(value);
        }

        if let Some(value) = read_env("SWITCHBOARD_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SWITCHBOARD_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("SWITCHBOARD_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("SWITCHBOARD_CRM_ENABLED") {
            self.crm.enabled = parse_bool("SWITCHBOARD_CRM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_CRM_LOGIN_URL") {
            self.crm.login_url = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_CRM_USERNAME") {
            self.crm.username = Some(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_CRM_PASSWORD") {
            self.crm.password = Some(secret_value(value));
        }
        if let Some(value) = read_env("SWITCHBOARD_CRM_SECURITY_TOKEN") {
            self.crm.security_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("SWITCHBOARD_CRM_ACCESS_TOKEN") {
            self.crm.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("SWITCHBOARD_CRM_INSTANCE_URL") {
            self.crm.instance_url = Some(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_CRM_TIMEOUT_SECS") {
            self.crm.timeout_secs = parse_u64("SWITCHBOARD_CRM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_CRM_MAX_RECORDS") {
            self.crm.max_records = parse_usize("SWITCHBOARD_CRM_MAX_RECORDS", &value)?;
        }

        if let Some(value) = read_env("SWITCHBOARD_MEMORY_MAX_MESSAGES") {
            self.memory.max_messages =
                Some(parse_usize("SWITCHBOARD_MEMORY_MAX_MESSAGES", &value)?);
        }

        let log_level =
            read_env("SWITCHBOARD_LOGGING_LEVEL").or_else(|| read_env("SWITCHBOARD_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SWITCHBOARD_LOGGING_FORMAT").or_else(|| read_env("SWITCHBOARD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(chat_app_token) = overrides.chat_app_token {
            self.chat.app_token = secret_value(chat_app_token);
        }
        if let Some(chat_bot_token) = overrides.chat_bot_token {
            self.chat.bot_token = secret_value(chat_bot_token);
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }

        if let Some(enabled) = overrides.crm_enabled {
            self.crm.enabled = enabled;
        }
        if let Some(username) = overrides.crm_username {
            self.crm.username = Some(username);
        }
        if let Some(password) = overrides.crm_password {
            self.crm.password = Some(secret_value(password));
        }
        if let Some(security_token) = overrides.crm_security_token {
            self.crm.security_token = Some(secret_value(security_token));
        }
        if let Some(access_token) = overrides.crm_access_token {
            self.crm.access_token = Some(secret_value(access_token));
        }
        if let Some(instance_url) = overrides.crm_instance_url {
            self.crm.instance_url = Some(instance_url);
        }

        if let Some(max_messages) = overrides.memory_max_messages {
            self.memory.max_messages = Some(max_messages);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_chat(&self.chat)?;
        validate_llm(&self.llm)?;
        validate_crm(&self.crm)?;
        validate_memory(&self.memory)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("switchboard.toml"), PathBuf::from("config/switchboard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if chat.app_token.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "chat.app_token is required (app-level token for the socket transport)".to_string(),
        ));
    }
    if chat.bot_token.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "chat.bot_token is required (bot token used for outbound messages)".to_string(),
        ));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation("llm.timeout_secs must be in range 1..=600".to_string()));
    }
    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }
    if llm.provider != LlmProvider::Ollama && llm.api_key.is_none() {
        return Err(ConfigError::Validation(format!(
            "llm.api_key is required for provider `{:?}`",
            llm.provider
        )));
    }
    Ok(())
}

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    // Credential absence is deliberately not a load-time failure: the CRM
    // session fails closed at connect time with a user-facing error string.
    if crm.login_url.trim().is_empty() {
        return Err(ConfigError::Validation("crm.login_url must not be empty".to_string()));
    }
    if crm.timeout_secs == 0 || crm.timeout_secs > 300 {
        return Err(ConfigError::Validation("crm.timeout_secs must be in range 1..=300".to_string()));
    }
    if crm.max_records == 0 {
        return Err(ConfigError::Validation(
            "crm.max_records must be greater than zero".to_string(),
        ));
    }
    if crm.max_response_bytes < 1_024 {
        return Err(ConfigError::Validation(
            "crm.max_response_bytes must be at least 1024".to_string(),
        ));
    }
    if crm.max_fields == 0 {
        return Err(ConfigError::Validation("crm.max_fields must be greater than zero".to_string()));
    }
    Ok(())
}

fn validate_memory(memory: &MemoryConfig) -> Result<(), ConfigError> {
    if memory.max_messages == Some(0) {
        return Err(ConfigError::Validation(
            "memory.max_messages must be greater than zero when set".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    let known = ["trace", "debug", "info", "warn", "error"];
    if !known.contains(&level.as_str()) {
        return Err(ConfigError::Validation(format!(
            "logging.level `{}` is not one of trace|debug|info|warn|error",
            logging.level
        )));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    chat: Option<ChatPatch>,
    llm: Option<LlmPatch>,
    crm: Option<CrmPatch>,
    memory: Option<MemoryPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    enabled: Option<bool>,
    login_url: Option<String>,
    api_version: Option<String>,
    username: Option<String>,
    password: Option<String>,
    security_token: Option<String>,
    access_token: Option<String>,
    instance_url: Option<String>,
    timeout_secs: Option<u64>,
    max_records: Option<usize>,
    max_response_bytes: Option<usize>,
    max_fields: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct MemoryPatch {
    max_messages: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
