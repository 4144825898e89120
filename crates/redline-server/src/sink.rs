use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::json;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::logger::LogRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("log destination is not provisioned")]
    NotProvisioned,
    #[error("log sink io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("log sink transport failed: {0}")]
    Transport(String),
    #[error("log sink rejected write with status {0}")]
    Rejected(u16),
    #[error("log record could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for structured records.
///
/// `append` may report [`SinkError::NotProvisioned`]; the logger then calls
/// `provision` once and retries.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn append(&self, record: &LogRecord) -> Result<(), SinkError>;
    async fn provision(&self) -> Result<(), SinkError>;
}

/// Remote collector organised in one stream per day.
pub struct HttpLogSink {
    client: Client,
    endpoint: String,
    stream_prefix: String,
}

impl HttpLogSink {
    pub fn new(endpoint: &str, stream_prefix: &str) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            stream_prefix: stream_prefix.to_string(),
        })
    }

    fn stream_name(&self) -> String {
        format!("{}-{}", self.stream_prefix, Utc::now().format("%Y-%m-%d"))
    }
}

#[async_trait]
impl LogSink for HttpLogSink {
    async fn append(&self, record: &LogRecord) -> Result<(), SinkError> {
        let stream = self.stream_name();
        let body = json!({
            "log_stream": stream,
            "events": [{
                "timestamp": Utc::now().timestamp_millis(),
                "message": serde_json::to_string(record)?,
            }],
        });
        let response = self
            .client
            .post(format!("{}/streams/{stream}/events", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(SinkError::NotProvisioned),
            s => Err(SinkError::Rejected(s.as_u16())),
        }
    }

    async fn provision(&self) -> Result<(), SinkError> {
        let stream = self.stream_name();
        let response = self
            .client
            .put(format!("{}/streams/{stream}", self.endpoint))
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        match response.status() {
            s if s.is_success() || s == StatusCode::CONFLICT => Ok(()),
            s => Err(SinkError::Rejected(s.as_u16())),
        }
    }
}

/// Local JSON-lines file. The file is opened per append, so concurrent
/// writers share no handle.
pub struct JsonlLogSink {
    path: PathBuf,
}

impl JsonlLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LogSink for JsonlLogSink {
    async fn append(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = match tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SinkError::NotProvisioned)
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn provision(&self) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(())
    }
}

/// In-process sink for tests and local inspection.
#[derive(Default)]
pub struct MemoryLogSink {
    records: Mutex<Vec<LogRecord>>,
    unprovisioned: AtomicBool,
    failing: AtomicBool,
    provision_calls: AtomicUsize,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects appends with `NotProvisioned` until `provision` is called.
    pub fn unprovisioned() -> Self {
        let sink = Self::default();
        sink.unprovisioned.store(true, Ordering::SeqCst);
        sink
    }

    /// Fails every append and provision.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.failing.store(true, Ordering::SeqCst);
        sink
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn provision_calls(&self) -> usize {
        self.provision_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn append(&self, record: &LogRecord) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Transport("memory sink unavailable".to_string()));
        }
        if self.unprovisioned.load(Ordering::SeqCst) {
            return Err(SinkError::NotProvisioned);
        }
        self.records
            .lock()
            .map_err(|_| SinkError::Transport("memory sink poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    async fn provision(&self) -> Result<(), SinkError> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Transport("memory sink unavailable".to_string()));
        }
        self.unprovisioned.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::LogLevel;
    use serde_json::Map;

    fn record(event: &str) -> LogRecord {
        LogRecord {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            level: LogLevel::Info,
            event: event.to_string(),
            session_id: "session_ab".to_string(),
            environment: "development".to_string(),
            fields: Map::new(),
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("redline-sink-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[tokio::test]
    async fn jsonl_sink_needs_provisioning_then_appends_lines() {
        let path = temp_path("records.jsonl");
        let sink = JsonlLogSink::new(&path);

        assert!(matches!(
            sink.append(&record("request_start")).await,
            Err(SinkError::NotProvisioned)
        ));
        sink.provision().await.unwrap();
        sink.append(&record("request_start")).await.unwrap();
        sink.append(&record("request_success")).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let events: Vec<String> = text
            .lines()
            .map(|l| serde_json::from_str::<LogRecord>(l).unwrap().event)
            .collect();
        assert_eq!(events, vec!["request_start", "request_success"]);
    }

    #[tokio::test]
    async fn provisioning_an_existing_file_keeps_its_content() {
        let path = temp_path("records.jsonl");
        let sink = JsonlLogSink::new(&path);
        sink.provision().await.unwrap();
        sink.append(&record("one")).await.unwrap();
        sink.provision().await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[tokio::test]
    async fn memory_sink_switches() {
        let sink = MemoryLogSink::unprovisioned();
        assert!(matches!(
            sink.append(&record("a")).await,
            Err(SinkError::NotProvisioned)
        ));
        sink.provision().await.unwrap();
        sink.append(&record("a")).await.unwrap();
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.provision_calls(), 1);

        let broken = MemoryLogSink::failing();
        assert!(broken.append(&record("a")).await.is_err());
        assert!(broken.provision().await.is_err());
        assert!(broken.records().is_empty());
    }
}
