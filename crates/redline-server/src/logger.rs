use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Timelike, Utc};
use redline_config::Config;
use redline_kernel::{browser_info, content_hash, sanitize, ServiceError, ValidFeedback};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::sink::{HttpLogSink, JsonlLogSink, LogSink, SinkError};

const SESSION_LOG_LEN: usize = 12;
const ACTION_LOG_LEN: usize = 20;
const TEMPLATE_LOG_LEN: usize = 200;
const MESSAGE_LOG_LEN: usize = 100;
const ERROR_CODE_LOG_LEN: usize = 50;
const ANONYMOUS_SESSION: &str = "anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: LogLevel,
    pub event: String,
    pub session_id: String,
    pub environment: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LogRecord {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Builds analytics records from sanitized values and ships them to the
/// configured sink. Never fails: a record that cannot be delivered is written
/// through `tracing` on the `redline::fallback` target instead.
///
/// A detached logger hands each delivery to its own task, so a slow remote
/// sink never holds up the request that produced the record.
pub struct StructuredLogger {
    sink: Option<Arc<dyn LogSink>>,
    environment: String,
    log_prompts: bool,
    detached: bool,
}

impl StructuredLogger {
    pub fn new(sink: Option<Arc<dyn LogSink>>, environment: &str, log_prompts: bool) -> Self {
        Self {
            sink,
            environment: environment.to_string(),
            log_prompts,
            detached: false,
        }
    }

    /// Deliver records from spawned tasks instead of the caller's.
    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ServiceError> {
        let remote = cfg.logging.sink == "http";
        let sink: Option<Arc<dyn LogSink>> = match cfg.logging.sink.as_str() {
            "http" => {
                let endpoint = cfg.logging.endpoint.as_deref().ok_or_else(|| {
                    ServiceError::configuration("logging.endpoint is required for the http sink")
                })?;
                let sink: Arc<dyn LogSink> = Arc::new(
                    HttpLogSink::new(endpoint, &cfg.logging.log_stream_prefix)
                        .map_err(|e| ServiceError::configuration(e.to_string()))?,
                );
                Some(sink)
            }
            "jsonl" => {
                let path = cfg.logging.jsonl_path.as_deref().ok_or_else(|| {
                    ServiceError::configuration("logging.jsonl_path is required for the jsonl sink")
                })?;
                let sink: Arc<dyn LogSink> = Arc::new(JsonlLogSink::new(path));
                Some(sink)
            }
            _ => None,
        };
        let logger = Self::new(sink, &cfg.environment, cfg.logging.log_prompts);
        Ok(if remote { logger.detached() } else { logger })
    }

    fn verbose(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub async fn request_start(
        &self,
        session_id: &str,
        action: &str,
        text_length: usize,
        template: Option<&str>,
    ) {
        let mut fields = object(json!({
            "action": sanitize(Some(action), ACTION_LOG_LEN),
            "text_length": text_length,
            "has_custom_prompt": template.is_some(),
        }));
        if let Some(template) = template.filter(|_| self.log_prompts) {
            fields.insert(
                "prompt_template".to_string(),
                json!(sanitize(Some(template), TEMPLATE_LOG_LEN)),
            );
            fields.insert(
                "prompt_template_hash".to_string(),
                json!(content_hash(template)),
            );
        }
        self.emit(LogLevel::Info, "request_start", Some(session_id), fields)
            .await;
    }

    pub async fn request_success(
        &self,
        session_id: &str,
        action: &str,
        elapsed: Duration,
        output_length: usize,
    ) {
        let processing_time_ms = (elapsed.as_secs_f64() * 100_000.0).round() / 100.0;
        let fields = object(json!({
            "action": sanitize(Some(action), ACTION_LOG_LEN),
            "processing_time_ms": processing_time_ms,
            "output_length": output_length,
            "status": "success",
        }));
        self.emit(LogLevel::Info, "request_success", Some(session_id), fields)
            .await;
    }

    pub async fn request_error(&self, session_id: &str, action: &str, err: &ServiceError) {
        let mut fields = object(json!({
            "action": sanitize(Some(action), ACTION_LOG_LEN),
            "error_type": err.kind.code(),
            "error_code": sanitize(Some(err.error_code()), ERROR_CODE_LOG_LEN),
            "status": "error",
        }));
        if self.verbose() {
            fields.insert(
                "error_message".to_string(),
                json!(sanitize(Some(err.message.as_str()), MESSAGE_LOG_LEN)),
            );
        }
        self.emit(LogLevel::Error, "request_error", Some(session_id), fields)
            .await;
    }

    pub async fn validation_error(&self, session_id: Option<&str>, err: &ServiceError) {
        let fields = object(json!({
            "validation_field": sanitize(err.field.as_deref(), ACTION_LOG_LEN),
            "error_message": sanitize(Some(err.message.as_str()), MESSAGE_LOG_LEN),
            "status": "validation_error",
        }));
        self.emit(LogLevel::Warning, "validation_error", session_id, fields)
            .await;
    }

    pub async fn feedback_submitted(&self, feedback_id: &str, feedback: &ValidFeedback) {
        let now = Utc::now();
        let browser = browser_info(feedback.user_agent.as_deref());
        let mut fields = object(json!({
            "feedback_id": feedback_id,
            "feedback_type": feedback.feedback_type.as_str(),
            "rating": feedback.rating,
            "has_message": feedback.message.is_some(),
            "message_length": feedback.message.as_deref().map_or(0, |m| m.chars().count()),
            "has_email": feedback.email.is_some(),
            "allow_contact": feedback.allow_contact,
            "extension_version": extension_version(feedback),
            "browser": browser.browser,
            "browser_version": browser.version,
            "platform": browser.platform,
            "day_of_week": now.format("%A").to_string(),
            "hour_of_day": now.hour(),
        }));
        insert_contact(&mut fields, feedback);
        let session = feedback.session_id.as_deref().unwrap_or(ANONYMOUS_SESSION);
        self.emit(LogLevel::Info, "feedback_submitted", Some(session), fields)
            .await;
    }

    pub async fn critical_feedback(&self, feedback_id: &str, feedback: &ValidFeedback) {
        let mut fields = object(json!({
            "feedback_id": feedback_id,
            "rating": feedback.rating,
            "feedback_type": feedback.feedback_type.as_str(),
            "extension_version": extension_version(feedback),
            "allow_contact": feedback.allow_contact,
            "message_preview": sanitize(feedback.message.as_deref(), MESSAGE_LOG_LEN),
            "requires_attention": true,
        }));
        insert_contact(&mut fields, feedback);
        let session = feedback.session_id.as_deref().unwrap_or(ANONYMOUS_SESSION);
        self.emit(LogLevel::Warning, "critical_feedback", Some(session), fields)
            .await;
    }

    async fn emit(
        &self,
        level: LogLevel,
        event: &str,
        session_id: Option<&str>,
        fields: Map<String, Value>,
    ) {
        let record = LogRecord {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            event: event.to_string(),
            session_id: sanitize(session_id, SESSION_LOG_LEN),
            environment: self.environment.clone(),
            fields,
        };
        self.write(record).await;
    }

    async fn write(&self, record: LogRecord) {
        let Some(sink) = self.sink.clone() else {
            write_fallback(&record, None);
            return;
        };
        if self.detached {
            tokio::spawn(async move { deliver(sink.as_ref(), &record).await });
        } else {
            deliver(sink.as_ref(), &record).await;
        }
    }
}

async fn deliver(sink: &dyn LogSink, record: &LogRecord) {
    let first = match sink.append(record).await {
        Ok(()) => return,
        Err(e) => e,
    };
    tracing::debug!(error = %first, event = %record.event, "log sink append failed, provisioning");
    if let Err(e) = provision_and_retry(sink, record).await {
        write_fallback(record, Some(&e));
    }
}

async fn provision_and_retry(sink: &dyn LogSink, record: &LogRecord) -> Result<(), SinkError> {
    sink.provision().await?;
    sink.append(record).await
}

fn write_fallback(record: &LogRecord, cause: Option<&SinkError>) {
    let line = serde_json::to_string(record).unwrap_or_else(|_| record.event.clone());
    let cause = cause.map(ToString::to_string).unwrap_or_default();
    match record.level {
        LogLevel::Info => tracing::info!(target: "redline::fallback", cause = %cause, "{line}"),
        LogLevel::Warning => tracing::warn!(target: "redline::fallback", cause = %cause, "{line}"),
        LogLevel::Error => tracing::error!(target: "redline::fallback", cause = %cause, "{line}"),
    }
}

fn extension_version(feedback: &ValidFeedback) -> String {
    sanitize(
        Some(feedback.extension_version.as_deref().unwrap_or("unknown")),
        ACTION_LOG_LEN,
    )
}

fn insert_contact(fields: &mut Map<String, Value>, feedback: &ValidFeedback) {
    if let Some(email) = feedback.contact_email() {
        fields.insert(
            "contact_email".to_string(),
            json!(sanitize(Some(email), MESSAGE_LOG_LEN)),
        );
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemoryLogSink;
    use async_trait::async_trait;
    use redline_contracts::FeedbackRequest;
    use redline_kernel::{validate_feedback, TRUNCATION_SUFFIX_LEN};

    struct StalledSink;

    #[async_trait]
    impl LogSink for StalledSink {
        async fn append(&self, _record: &LogRecord) -> Result<(), SinkError> {
            std::future::pending().await
        }

        async fn provision(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn logger(sink: Arc<MemoryLogSink>, environment: &str, log_prompts: bool) -> StructuredLogger {
        StructuredLogger::new(Some(sink as Arc<dyn LogSink>), environment, log_prompts)
    }

    fn feedback(rating: i64, allow_contact: bool) -> ValidFeedback {
        validate_feedback(&FeedbackRequest {
            feedback_type: "bug".to_string(),
            rating,
            message: Some("The rephrase button vanished".to_string()),
            email: Some("me@example.com".to_string()),
            allow_contact,
            extension_version: None,
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0".to_string()),
            session_id: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn session_id_is_cut_to_twelve_characters() {
        let sink = Arc::new(MemoryLogSink::new());
        let log = logger(sink.clone(), "production", true);
        log.request_start("session_0123abcd", "grammar_fix", 10, None)
            .await;
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].session_id.starts_with("session_0123..."));
        assert_eq!(records[0].level, LogLevel::Info);
        assert_eq!(records[0].field("has_custom_prompt"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn template_logging_follows_the_flag() {
        let template = "Pirate voice: {selected_text}";

        let sink = Arc::new(MemoryLogSink::new());
        logger(sink.clone(), "production", true)
            .request_start("s", "rephrase", 5, Some(template))
            .await;
        let records = sink.records();
        let record = &records[0];
        assert_eq!(record.field("prompt_template"), Some(&json!(template)));
        assert_eq!(
            record.field("prompt_template_hash"),
            Some(&json!(content_hash(template)))
        );

        let sink = Arc::new(MemoryLogSink::new());
        logger(sink.clone(), "production", false)
            .request_start("s", "rephrase", 5, Some(template))
            .await;
        let records = sink.records();
        let record = &records[0];
        assert_eq!(record.field("has_custom_prompt"), Some(&json!(true)));
        assert!(record.field("prompt_template").is_none());
        assert!(record.field("prompt_template_hash").is_none());
    }

    #[tokio::test]
    async fn long_templates_are_cut_and_tagged() {
        let template = format!("{}{{selected_text}}", "Use plain words. ".repeat(15));
        assert!(template.chars().count() > TEMPLATE_LOG_LEN);

        let sink = Arc::new(MemoryLogSink::new());
        logger(sink.clone(), "production", true)
            .request_start("s", "rephrase", 5, Some(template.as_str()))
            .await;
        let records = sink.records();
        let expected = format!(
            "{}...[hash:{}]",
            &template[..TEMPLATE_LOG_LEN],
            content_hash(&template)
        );
        assert_eq!(records[0].field("prompt_template"), Some(&json!(expected)));
        assert_eq!(
            records[0].field("prompt_template_hash"),
            Some(&json!(content_hash(&template)))
        );
    }

    #[tokio::test]
    async fn long_feedback_messages_are_previewed() {
        let message = "The toolbar overlaps the editor again. ".repeat(8);
        let valid = validate_feedback(&FeedbackRequest {
            feedback_type: "bug".to_string(),
            rating: 2,
            message: Some(message.clone()),
            email: None,
            allow_contact: false,
            extension_version: None,
            user_agent: None,
            session_id: None,
        })
        .unwrap();

        let sink = Arc::new(MemoryLogSink::new());
        logger(sink.clone(), "production", true)
            .critical_feedback("fb-4", &valid)
            .await;
        let records = sink.records();
        let preview = records[0].field("message_preview").unwrap().as_str().unwrap();
        let trimmed = message.trim();
        assert_eq!(
            preview,
            format!("{}...[hash:{}]", &trimmed[..MESSAGE_LOG_LEN], content_hash(trimmed))
        );
        assert_eq!(preview.chars().count(), MESSAGE_LOG_LEN + TRUNCATION_SUFFIX_LEN);
    }

    #[tokio::test]
    async fn error_message_only_in_development() {
        let err = ServiceError::llm_service("provider transport failed")
            .with_details(json!({"error_code": "provider_transport_error"}));

        let sink = Arc::new(MemoryLogSink::new());
        logger(sink.clone(), "production", true)
            .request_error("s", "grammar_fix", &err)
            .await;
        let records = sink.records();
        let record = &records[0];
        assert_eq!(record.level, LogLevel::Error);
        assert_eq!(record.field("error_code"), Some(&json!("provider_transport_error")));
        assert!(record.field("error_message").is_none());

        let sink = Arc::new(MemoryLogSink::new());
        logger(sink.clone(), "development", true)
            .request_error("s", "grammar_fix", &err)
            .await;
        assert_eq!(
            sink.records()[0].field("error_message"),
            Some(&json!("provider transport failed"))
        );
    }

    #[tokio::test]
    async fn processing_time_has_two_decimals() {
        let sink = Arc::new(MemoryLogSink::new());
        logger(sink.clone(), "production", true)
            .request_success("s", "grammar_fix", Duration::from_micros(12_346), 40)
            .await;
        assert_eq!(
            sink.records()[0].field("processing_time_ms"),
            Some(&json!(12.35))
        );
    }

    #[tokio::test]
    async fn unprovisioned_sink_is_provisioned_once_and_retried() {
        let sink = Arc::new(MemoryLogSink::unprovisioned());
        let log = logger(sink.clone(), "production", true);
        log.request_start("s", "grammar_fix", 3, None).await;
        log.request_start("s", "grammar_fix", 3, None).await;
        assert_eq!(sink.provision_calls(), 1);
        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test]
    async fn failing_sink_falls_back_without_error() {
        let sink = Arc::new(MemoryLogSink::failing());
        let log = logger(sink.clone(), "production", true);
        log.request_start("s", "grammar_fix", 3, None).await;
        assert_eq!(sink.provision_calls(), 1);
        assert!(sink.records().is_empty());

        StructuredLogger::new(None, "production", true)
            .request_start("s", "grammar_fix", 3, None)
            .await;
    }

    #[tokio::test]
    async fn detached_delivery_does_not_wait_for_the_sink() {
        let stalled = StructuredLogger::new(
            Some(Arc::new(StalledSink) as Arc<dyn LogSink>),
            "production",
            true,
        )
        .detached();
        let returned = tokio::time::timeout(
            Duration::from_secs(1),
            stalled.request_start("s", "grammar_fix", 3, None),
        )
        .await;
        assert!(returned.is_ok());

        let sink = Arc::new(MemoryLogSink::new());
        let log = logger(sink.clone(), "production", true).detached();
        log.request_start("s", "grammar_fix", 3, None).await;
        for _ in 0..100 {
            if !sink.records().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn contact_email_requires_consent() {
        let sink = Arc::new(MemoryLogSink::new());
        let log = logger(sink.clone(), "production", true);
        log.feedback_submitted("fb-1", &feedback(4, false)).await;
        log.feedback_submitted("fb-2", &feedback(4, true)).await;
        let records = sink.records();
        assert!(records[0].field("contact_email").is_none());
        assert_eq!(records[0].field("has_email"), Some(&json!(true)));
        assert_eq!(records[1].field("contact_email"), Some(&json!("me@example.com")));
        assert_eq!(records[1].field("browser"), Some(&json!("Firefox")));
        assert_eq!(records[1].field("extension_version"), Some(&json!("unknown")));
        assert_eq!(records[1].session_id, "anonymous");
    }

    #[tokio::test]
    async fn critical_feedback_is_a_warning() {
        let sink = Arc::new(MemoryLogSink::new());
        logger(sink.clone(), "production", true)
            .critical_feedback("fb-3", &feedback(1, false))
            .await;
        let records = sink.records();
        let record = &records[0];
        assert_eq!(record.level, LogLevel::Warning);
        assert_eq!(record.event, "critical_feedback");
        assert_eq!(record.field("requires_attention"), Some(&json!(true)));
        assert_eq!(
            record.field("message_preview"),
            Some(&json!("The rephrase button vanished"))
        );
    }
}
