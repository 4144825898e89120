use std::collections::BTreeMap;

use redline_contracts::{
    ACTION_GRAMMAR_FIX, ACTION_REPHRASE, BUILT_IN_TONES, PARAM_CUSTOM_PROMPT, PARAM_STYLE_NAME,
    PARAM_TONE, SELECTED_TEXT_PLACEHOLDER,
};

use crate::error::ServiceError;

pub const MAX_SELECTED_TEXT_CHARS: usize = 10_000;
pub const MAX_CUSTOM_PROMPT_CHARS: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    GrammarFix,
    Rephrase,
}

impl Action {
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        match value {
            ACTION_GRAMMAR_FIX => Ok(Action::GrammarFix),
            ACTION_REPHRASE => Ok(Action::Rephrase),
            _ => Err(ServiceError::validation(
                "action",
                format!(
                    "Unsupported action. Supported actions: {ACTION_GRAMMAR_FIX}, {ACTION_REPHRASE}"
                ),
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::GrammarFix => ACTION_GRAMMAR_FIX,
            Action::Rephrase => ACTION_REPHRASE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Professional,
    Casual,
    Academic,
    Creative,
    Technical,
}

impl Tone {
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        match value {
            "professional" => Ok(Tone::Professional),
            "casual" => Ok(Tone::Casual),
            "academic" => Ok(Tone::Academic),
            "creative" => Ok(Tone::Creative),
            "technical" => Ok(Tone::Technical),
            _ => Err(ServiceError::validation(
                PARAM_TONE,
                format!("Invalid tone. Valid tones: {}", BUILT_IN_TONES.join(", ")),
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Academic => "academic",
            Tone::Creative => "creative",
            Tone::Technical => "technical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RephraseStyle {
    Tone(Tone),
    Custom {
        template: String,
        style_name: Option<String>,
    },
}

/// The one instruction sent to the generation provider for a request.
///
/// Fields are private: once built the instruction cannot be edited, only
/// read. The substituted text is never exposed for logging; only the
/// template of a custom style is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstruction {
    action: Action,
    style: Option<RephraseStyle>,
    text: String,
}

impl ResolvedInstruction {
    pub fn action(&self) -> Action {
        self.action
    }

    pub fn style(&self) -> Option<&RephraseStyle> {
        self.style.as_ref()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Custom template as supplied by the caller, before substitution.
    pub fn template(&self) -> Option<&str> {
        match &self.style {
            Some(RephraseStyle::Custom { template, .. }) => Some(template),
            _ => None,
        }
    }

    /// Human summary of what the action did, used in the response.
    pub fn summary(&self) -> String {
        match &self.style {
            None => "Fixed grammar and spelling errors".to_string(),
            Some(RephraseStyle::Tone(tone)) => format!("Rephrased text in {} tone", tone.as_str()),
            Some(RephraseStyle::Custom {
                style_name: Some(name),
                ..
            }) => format!("Rephrased text using '{name}' style"),
            Some(RephraseStyle::Custom { .. }) => "Rephrased text with custom style".to_string(),
        }
    }
}

pub fn resolve(
    selected_text: &str,
    action: &str,
    parameters: &BTreeMap<String, String>,
) -> Result<ResolvedInstruction, ServiceError> {
    validate_selected_text(selected_text)?;
    let action = Action::parse(action)?;

    match action {
        Action::GrammarFix => Ok(ResolvedInstruction {
            action,
            style: None,
            text: grammar_instruction(selected_text),
        }),
        Action::Rephrase => {
            let style = rephrase_style(parameters)?;
            let text = match &style {
                RephraseStyle::Tone(tone) => tone_instruction(*tone, selected_text),
                RephraseStyle::Custom { template, .. } => {
                    custom_instruction(template, selected_text)
                }
            };
            Ok(ResolvedInstruction {
                action,
                style: Some(style),
                text,
            })
        }
    }
}

fn validate_selected_text(text: &str) -> Result<(), ServiceError> {
    if text.trim().is_empty() {
        return Err(ServiceError::validation(
            "selected_text",
            "Selected text cannot be empty",
        ));
    }
    if text.chars().count() > MAX_SELECTED_TEXT_CHARS {
        return Err(ServiceError::validation(
            "selected_text",
            format!("Selected text too long (max {MAX_SELECTED_TEXT_CHARS} characters)"),
        ));
    }
    Ok(())
}

fn rephrase_style(parameters: &BTreeMap<String, String>) -> Result<RephraseStyle, ServiceError> {
    let present = |key: &str| {
        parameters
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    };

    match (present(PARAM_TONE), present(PARAM_CUSTOM_PROMPT)) {
        (Some(_), Some(_)) => Err(ServiceError::validation(
            "parameters",
            "Cannot specify both 'tone' and 'custom_prompt' parameters",
        )),
        (None, None) => Err(ServiceError::validation(
            "parameters",
            "Must specify either 'tone' or 'custom_prompt' parameter for rephrase action",
        )),
        (Some(tone), None) => Ok(RephraseStyle::Tone(Tone::parse(tone)?)),
        (None, Some(template)) => {
            if !template.contains(SELECTED_TEXT_PLACEHOLDER) {
                return Err(ServiceError::validation(
                    PARAM_CUSTOM_PROMPT,
                    format!("Custom prompt must contain '{SELECTED_TEXT_PLACEHOLDER}' placeholder"),
                ));
            }
            if template.chars().count() > MAX_CUSTOM_PROMPT_CHARS {
                return Err(ServiceError::validation(
                    PARAM_CUSTOM_PROMPT,
                    format!("Custom prompt too long (max {MAX_CUSTOM_PROMPT_CHARS} characters)"),
                ));
            }
            Ok(RephraseStyle::Custom {
                template: template.to_string(),
                style_name: present(PARAM_STYLE_NAME)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            })
        }
    }
}

fn grammar_instruction(text: &str) -> String {
    format!("Action: GRAMMAR_FIX\nText to process: \"{text}\"")
}

fn tone_instruction(tone: Tone, text: &str) -> String {
    format!(
        "Action: REPHRASE\nTone: {}\nText to process: \"{text}\"",
        tone.as_str()
    )
}

// Substitution is a single left-to-right pass, so a placeholder that appears
// inside the selected text is not expanded again.
fn custom_instruction(template: &str, text: &str) -> String {
    let substituted = template.replace(SELECTED_TEXT_PLACEHOLDER, text);
    format!(
        "Process the following instruction:\n\n{substituted}\n\n\
         Return only the processed text without any additional explanations or commentary."
    )
}
