use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const API_VERSION: &str = "0.1.0";
pub const SERVICE_NAME: &str = "Redline Writing Service";

pub const ACTION_GRAMMAR_FIX: &str = "grammar_fix";
pub const ACTION_REPHRASE: &str = "rephrase";
pub const SUPPORTED_ACTIONS: [&str; 2] = [ACTION_GRAMMAR_FIX, ACTION_REPHRASE];

pub const BUILT_IN_TONES: [&str; 5] = ["professional", "casual", "academic", "creative", "technical"];

/// Token a custom prompt must contain; replaced by the selected text.
pub const SELECTED_TEXT_PLACEHOLDER: &str = "{selected_text}";

pub const PARAM_TONE: &str = "tone";
pub const PARAM_CUSTOM_PROMPT: &str = "custom_prompt";
pub const PARAM_STYLE_NAME: &str = "style_name";

pub const FEEDBACK_TYPES: [&str; 4] = ["general", "bug", "feature", "improvement"];

#[derive(Debug, Clone)]
pub struct ContractSchemaManifest {
    pub path: &'static str,
    pub sha256: &'static str,
    pub body: &'static str,
}

#[derive(Debug, Clone)]
pub struct ContractsManifest {
    pub openapi_sha256: &'static str,
    pub contracts_set_sha256: &'static str,
    pub generated_at: &'static str,
    pub schemas: Vec<ContractSchemaManifest>,
}

include!(concat!(env!("OUT_DIR"), "/generated_contracts.rs"));

pub fn contracts_manifest_v1() -> ContractsManifest {
    ContractsManifest {
        openapi_sha256: GENERATED_OPENAPI_SHA256,
        contracts_set_sha256: GENERATED_CONTRACTS_SET_SHA256,
        generated_at: GENERATED_AT_RFC3339,
        schemas: GENERATED_CONTRACT_SCHEMAS
            .iter()
            .map(|(path, sha256, body)| ContractSchemaManifest { path, sha256, body })
            .collect(),
    }
}

/// Inbound text-processing request. `action` stays a plain string so the
/// kernel can report an unsupported value as a field-attributed error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessTextRequest {
    pub selected_text: String,
    pub action: String,
    #[serde(default)]
    pub parameters: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ProcessTextRequest {
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .as_ref()
            .and_then(|p| p.get(key))
            .map(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProcessTextResponse {
    pub success: bool,
    pub processed_text: String,
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    #[serde(rename = "type")]
    pub feedback_type: String,
    pub rating: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub allow_contact: bool,
    #[serde(default)]
    pub extension_version: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FeedbackResponse {
    pub success: bool,
    pub message: String,
    pub feedback_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RephraseOptions {
    pub built_in_tones: Vec<String>,
    pub custom_prompts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HealthResponse {
    pub message: String,
    pub service: String,
    pub version: String,
    pub status: String,
    pub supported_actions: Vec<String>,
    pub rephrase_options: RephraseOptions,
}

impl HealthResponse {
    /// Static service description; independent of configuration.
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            service: SERVICE_NAME.to_string(),
            version: API_VERSION.to_string(),
            status: "healthy".to_string(),
            supported_actions: SUPPORTED_ACTIONS.iter().map(|a| a.to_string()).collect(),
            rephrase_options: RephraseOptions {
                built_in_tones: BUILT_IN_TONES.iter().map(|t| t.to_string()).collect(),
                custom_prompts: format!("Supported with {SELECTED_TEXT_PLACEHOLDER} placeholder"),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractsMetadata {
    pub api_version: String,
    pub openapi_sha256: String,
    pub contracts_set_sha256: String,
    pub generated_at: String,
    pub schemas: BTreeMap<String, String>,
}

impl ContractsMetadata {
    pub fn from_manifest(manifest: &ContractsManifest) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            openapi_sha256: manifest.openapi_sha256.to_string(),
            contracts_set_sha256: manifest.contracts_set_sha256.to_string(),
            generated_at: manifest.generated_at.to_string(),
            schemas: manifest
                .schemas
                .iter()
                .map(|s| (s.path.to_string(), s.sha256.to_string()))
                .collect(),
        }
    }
}
