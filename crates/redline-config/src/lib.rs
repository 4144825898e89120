use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config failed: {0}")]
    Read(String),
    #[error("parse config failed: {0}")]
    Parse(String),
    #[error("schema load failed: {0}")]
    SchemaLoad(String),
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),
    #[error("unsupported config: {0}")]
    UnsupportedConfig(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_environment")]
    pub environment: String,
    pub server: Server,
    pub generation: Generation,
    pub logging: Logging,
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub listen_addr: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub region: String,
    pub model_id: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Generation {
    /// Explicit endpoint, or the regional Bedrock runtime host.
    pub fn resolved_endpoint(&self) -> String {
        match &self.endpoint {
            Some(v) if !v.trim().is_empty() => v.trim_end_matches('/').to_string(),
            _ => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub sink: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub jsonl_path: Option<String>,
    #[serde(default = "default_log_stream_prefix")]
    pub log_stream_prefix: String,
    #[serde(default = "default_log_prompts")]
    pub log_prompts: bool,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_api_key_env() -> Option<String> {
    Some("AWS_BEARER_TOKEN_BEDROCK".to_string())
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_log_stream_prefix() -> String {
    "redline".to_string()
}

fn default_log_prompts() -> bool {
    true
}

pub fn load_and_validate(path: &str) -> Result<Config, ConfigError> {
    load_with_env(path, |key| std::env::var(key).ok())
}

/// Same as [`load_and_validate`] with an injectable environment lookup.
pub fn load_with_env<F>(path: &str, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config_text =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
    let value: serde_yaml::Value =
        serde_yaml::from_str(&config_text).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let instance = serde_json::to_value(value).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_against_schema(&instance)?;

    let mut cfg: Config =
        serde_json::from_value(instance).map_err(|e| ConfigError::Parse(e.to_string()))?;
    apply_env_overrides(&mut cfg, lookup)?;
    validate_runtime_support(&cfg)?;
    Ok(cfg)
}

pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(v) = get("ENVIRONMENT") {
        cfg.environment = v.to_lowercase();
    }
    if let Some(v) = get("LISTEN_ADDR") {
        cfg.server.listen_addr = v;
    }
    if let Some(v) = get("CORS_ORIGINS") {
        cfg.server.cors_origins = v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(v) = get("AWS_REGION") {
        cfg.generation.region = v;
    }
    if let Some(v) = get("BEDROCK_MODEL_ID") {
        cfg.generation.model_id = v;
    }
    if let Some(v) = get("REDLINE_LOG_SINK") {
        cfg.logging.sink = v.to_lowercase();
    }
    if let Some(v) = get("REDLINE_LOG_ENDPOINT") {
        cfg.logging.endpoint = Some(v);
    }
    if let Some(v) = get("LOG_PROMPTS_ONLY") {
        cfg.logging.log_prompts = match v.to_lowercase().as_str() {
            "true" => true,
            "false" => false,
            other => {
                return Err(ConfigError::UnsupportedConfig(format!(
                    "LOG_PROMPTS_ONLY={other} is not a boolean; expected true or false"
                )))
            }
        };
    }
    Ok(())
}

fn validate_against_schema(instance: &serde_json::Value) -> Result<(), ConfigError> {
    let schema_path = [
        std::path::PathBuf::from("config/config.schema.json"),
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .join("config/config.schema.json"),
    ]
    .into_iter()
    .find(|p| p.exists())
    .ok_or_else(|| {
        ConfigError::SchemaLoad(
            "config schema not found at config/config.schema.json or workspace config path"
                .to_string(),
        )
    })?;

    let schema_text =
        std::fs::read_to_string(schema_path).map_err(|e| ConfigError::SchemaLoad(e.to_string()))?;
    let schema: serde_json::Value =
        serde_json::from_str(&schema_text).map_err(|e| ConfigError::SchemaLoad(e.to_string()))?;

    let validator =
        jsonschema::validator_for(&schema).map_err(|e| ConfigError::SchemaLoad(e.to_string()))?;
    if let Err(first) = validator.validate(instance) {
        return Err(ConfigError::SchemaValidation(first.to_string()));
    }
    Ok(())
}

fn validate_runtime_support(cfg: &Config) -> Result<(), ConfigError> {
    if !cfg.is_development() && !cfg.is_production() {
        return Err(ConfigError::UnsupportedConfig(format!(
            "environment={} is not supported; supported: development, production",
            cfg.environment
        )));
    }
    if cfg.generation.region.trim().is_empty() {
        return Err(ConfigError::UnsupportedConfig(
            "generation.region must not be empty".to_string(),
        ));
    }
    if cfg.generation.model_id.trim().is_empty() {
        return Err(ConfigError::UnsupportedConfig(
            "generation.model_id must not be empty".to_string(),
        ));
    }
    if cfg.generation.max_tokens == 0 {
        return Err(ConfigError::UnsupportedConfig(
            "generation.max_tokens must be >= 1".to_string(),
        ));
    }
    match cfg.logging.sink.as_str() {
        "http" => {
            if is_blank(cfg.logging.endpoint.as_deref()) {
                return Err(ConfigError::UnsupportedConfig(
                    "logging.endpoint is required when logging.sink=http".to_string(),
                ));
            }
        }
        "jsonl" => {
            if is_blank(cfg.logging.jsonl_path.as_deref()) {
                return Err(ConfigError::UnsupportedConfig(
                    "logging.jsonl_path is required when logging.sink=jsonl".to_string(),
                ));
            }
        }
        "stdout" => {}
        other => {
            return Err(ConfigError::UnsupportedConfig(format!(
                "logging.sink={other} is not implemented; supported: http, jsonl, stdout"
            )))
        }
    }
    Ok(())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn write_temp_config(contents: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("redline-config-test-{nanos}.yaml"));
        std::fs::write(&path, contents).expect("write temp config");
        path.to_string_lossy().to_string()
    }

    fn base_yaml() -> String {
        r#"
environment: "development"

server:
  listen_addr: "127.0.0.1:0"

generation:
  region: "us-east-1"
  model_id: "us.anthropic.claude-3-7-sonnet-20250219-v1:0"

logging:
  sink: "jsonl"
  jsonl_path: "./redline-logs.jsonl"
  log_prompts: true
"#
        .to_string()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn applies_defaults_for_optional_sections() {
        let path = write_temp_config(&base_yaml());
        let cfg = load_with_env(&path, no_env).expect("base config should load");
        assert_eq!(cfg.server.cors_origins, vec!["*".to_string()]);
        assert_eq!(cfg.generation.max_tokens, 1000);
        assert_eq!(cfg.generation.timeout_ms, None);
        assert_eq!(cfg.logging.log_stream_prefix, "redline");
        assert_eq!(
            cfg.generation.resolved_endpoint(),
            "https://bedrock-runtime.us-east-1.amazonaws.com"
        );
        assert!(cfg.is_development());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let path = write_temp_config(&base_yaml());
        let env: HashMap<&str, &str> = HashMap::from([
            ("ENVIRONMENT", "Production"),
            ("AWS_REGION", "eu-west-1"),
            ("LOG_PROMPTS_ONLY", "false"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("REDLINE_LOG_SINK", "stdout"),
        ]);
        let cfg = load_with_env(&path, |k| env.get(k).map(|v| v.to_string()))
            .expect("overridden config should load");
        assert!(cfg.is_production());
        assert_eq!(cfg.generation.region, "eu-west-1");
        assert!(!cfg.logging.log_prompts);
        assert_eq!(
            cfg.server.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(cfg.logging.sink, "stdout");
    }

    #[test]
    fn rejects_non_boolean_prompt_flag() {
        let path = write_temp_config(&base_yaml());
        let err = load_with_env(&path, |k| {
            (k == "LOG_PROMPTS_ONLY").then(|| "sometimes".to_string())
        })
        .expect_err("expected unsupported config");
        assert!(matches!(err, ConfigError::UnsupportedConfig(_)));
    }

    #[test]
    fn rejects_http_sink_without_endpoint() {
        let path = write_temp_config(&base_yaml().replace(
            "sink: \"jsonl\"\n  jsonl_path: \"./redline-logs.jsonl\"",
            "sink: \"http\"",
        ));
        let err = load_with_env(&path, no_env).expect_err("expected unsupported config");
        assert!(matches!(
            err,
            ConfigError::SchemaValidation(_) | ConfigError::UnsupportedConfig(_)
        ));
    }

    #[test]
    fn rejects_unknown_environment() {
        let path = write_temp_config(&base_yaml().replace("development", "staging"));
        let err = load_with_env(&path, no_env).expect_err("expected unsupported config");
        assert!(matches!(
            err,
            ConfigError::SchemaValidation(_) | ConfigError::UnsupportedConfig(_)
        ));
    }

    #[test]
    fn rejects_missing_generation_section() {
        let path = write_temp_config(
            r#"
server:
  listen_addr: "127.0.0.1:0"
logging:
  sink: "stdout"
"#,
        );
        let err = load_with_env(&path, no_env).expect_err("expected schema failure");
        assert!(matches!(
            err,
            ConfigError::SchemaValidation(_) | ConfigError::Parse(_)
        ));
    }

    #[test]
    fn explicit_endpoint_wins_over_region() {
        let generation = Generation {
            region: "us-east-1".to_string(),
            model_id: "m".to_string(),
            endpoint: Some("http://127.0.0.1:9000/".to_string()),
            api_key_env: None,
            max_tokens: 10,
            timeout_ms: None,
        };
        assert_eq!(generation.resolved_endpoint(), "http://127.0.0.1:9000");
    }
}
