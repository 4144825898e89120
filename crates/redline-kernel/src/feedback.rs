use std::sync::LazyLock;

use redline_contracts::{FeedbackRequest, FEEDBACK_TYPES};
use regex::Regex;

use crate::error::ServiceError;

pub const MAX_FEEDBACK_MESSAGE_CHARS: usize = 2_000;
pub const MAX_EMAIL_CHARS: usize = 254;
pub const CRITICAL_RATING_MAX: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackType {
    General,
    Bug,
    Feature,
    Improvement,
}

impl FeedbackType {
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        match value {
            "general" => Ok(FeedbackType::General),
            "bug" => Ok(FeedbackType::Bug),
            "feature" => Ok(FeedbackType::Feature),
            "improvement" => Ok(FeedbackType::Improvement),
            _ => Err(ServiceError::validation(
                "type",
                format!("Invalid feedback type. Valid types: {}", FEEDBACK_TYPES.join(", ")),
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackType::General => "general",
            FeedbackType::Bug => "bug",
            FeedbackType::Feature => "feature",
            FeedbackType::Improvement => "improvement",
        }
    }
}

/// Feedback that passed every constraint; optional strings are trimmed and
/// empty ones dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidFeedback {
    pub feedback_type: FeedbackType,
    pub rating: u8,
    pub message: Option<String>,
    pub email: Option<String>,
    pub allow_contact: bool,
    pub extension_version: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
}

impl ValidFeedback {
    /// Email, only when the submitter agreed to be contacted.
    pub fn contact_email(&self) -> Option<&str> {
        if self.allow_contact {
            self.email.as_deref()
        } else {
            None
        }
    }

    pub fn is_critical(&self) -> bool {
        self.rating <= CRITICAL_RATING_MAX
    }
}

/// Checks fields in declaration order and reports the first violation.
pub fn validate_feedback(req: &FeedbackRequest) -> Result<ValidFeedback, ServiceError> {
    let feedback_type = FeedbackType::parse(&req.feedback_type)?;

    let rating = u8::try_from(req.rating)
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| ServiceError::validation("rating", "Rating must be between 1 and 5"))?;

    let message = trimmed(req.message.as_deref());
    if let Some(m) = &message {
        if m.chars().count() > MAX_FEEDBACK_MESSAGE_CHARS {
            return Err(ServiceError::validation(
                "message",
                format!("Message too long (max {MAX_FEEDBACK_MESSAGE_CHARS} characters)"),
            ));
        }
    }

    let email = trimmed(req.email.as_deref());
    match &email {
        None if req.allow_contact => {
            return Err(ServiceError::validation(
                "email",
                "Email is required when allow_contact is true",
            ))
        }
        Some(e) if !e.contains('@') => {
            return Err(ServiceError::validation(
                "email",
                "Email must contain '@'",
            ))
        }
        Some(e) if e.chars().count() > MAX_EMAIL_CHARS => {
            return Err(ServiceError::validation(
                "email",
                format!("Email too long (max {MAX_EMAIL_CHARS} characters)"),
            ))
        }
        _ => {}
    }

    Ok(ValidFeedback {
        feedback_type,
        rating,
        message,
        email,
        allow_contact: req.allow_contact,
        extension_version: trimmed(req.extension_version.as_deref()),
        user_agent: trimmed(req.user_agent.as_deref()),
        session_id: trimmed(req.session_id.as_deref()),
    })
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserInfo {
    pub browser: String,
    pub version: String,
    pub platform: String,
}

impl BrowserInfo {
    fn unknown() -> Self {
        Self {
            browser: "unknown".to_string(),
            version: "unknown".to_string(),
            platform: "unknown".to_string(),
        }
    }
}

// Edge and Opera advertise Chrome too, so they are matched first.
static BROWSER_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("Edge", r"Edg/(\d+\.\d+)"),
        ("Opera", r"OPR/(\d+\.\d+)"),
        ("Chrome", r"Chrome/(\d+\.\d+)"),
        ("Firefox", r"Firefox/(\d+\.\d+)"),
        ("Safari", r"Safari/(\d+\.\d+)"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("valid browser regex")))
    .collect()
});

pub fn browser_info(user_agent: Option<&str>) -> BrowserInfo {
    let Some(ua) = user_agent.filter(|v| !v.trim().is_empty()) else {
        return BrowserInfo::unknown();
    };

    let mut info = BrowserInfo::unknown();
    if let Some((name, version)) = BROWSER_PATTERNS.iter().find_map(|(name, re)| {
        re.captures(ua)
            .and_then(|c| c.get(1))
            .map(|m| (*name, m.as_str()))
    }) {
        info.browser = name.to_string();
        info.version = version.to_string();
    }

    // Mobile agents also name the desktop system they derive from
    // ("Linux; Android", "like Mac OS X"), so they are checked first.
    let platform = if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("Android") {
        "Android"
    } else if ua.contains("iPhone") || ua.contains("iPad") {
        "iOS"
    } else if ua.contains("Macintosh") || ua.contains("Mac OS") {
        "macOS"
    } else if ua.contains("Linux") {
        "Linux"
    } else {
        "unknown"
    };
    info.platform = platform.to_string();
    info
}
