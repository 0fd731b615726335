//! Persistent structured logging for long-running services
//!
//! Provides a thread-safe, disk-backed log store:
//! - JSONL storage, appended per entry
//! - Async operations with internal locking
//! - Optional console echo (silent mode for tests)
//! - Level filtering and limiting on retrieval

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "schemars")]
use schemars::JsonSchema;

/// Request context attached to a log entry
#[derive(Debug, Serialize, Deserialize, Clone)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
pub struct LogContext {
  /// Request ID for correlation
  #[serde(skip_serializing_if = "Option::is_none")]
  pub request_id: Option<String>,

  /// HTTP method
  #[serde(skip_serializing_if = "Option::is_none")]
  pub method: Option<String>,

  /// Request path
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,

  /// Originating client address
  #[serde(skip_serializing_if = "Option::is_none")]
  pub client: Option<String>,

  /// Request duration in milliseconds
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration_ms: Option<f64>,

  /// HTTP status code
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status_code: Option<u16>,
}

/// A structured log entry
#[derive(Debug, Serialize, Deserialize, Clone)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
pub struct LogEntry {
  pub timestamp: DateTime<Utc>,
  pub level: String,
  pub message: String,
  pub component: String,

  /// Optional request context
  #[serde(skip_serializing_if = "Option::is_none")]
  pub context: Option<LogContext>,
}

struct ServiceLogsInner {
  log_file_path: std::path::PathBuf,
  silent: bool,
}

/// Thread-safe disk-based log storage using JSONL format
#[derive(Clone)]
pub struct ServiceLogs {
  inner: std::sync::Arc<tokio::sync::Mutex<ServiceLogsInner>>,
}

impl ServiceLogsInner {
  fn new<P: AsRef<std::path::Path>>(log_file_path: P, silent: bool) -> std::io::Result<Self> {
    let log_file_path = log_file_path.as_ref().to_path_buf();

    if let Some(parent) = log_file_path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    // Create the file if missing, never truncate an existing one
    if !log_file_path.exists() {
      std::fs::File::create(&log_file_path)?;
    }

    Ok(Self { log_file_path, silent })
  }

  fn append(
    &mut self,
    level: &str,
    message: &str,
    component: &str,
    context: Option<LogContext>,
  ) -> std::io::Result<()> {
    let entry = LogEntry {
      timestamp: Utc::now(),
      level: level.to_string(),
      message: message.to_string(),
      component: component.to_string(),
      context,
    };

    let json_line = serde_json::to_string(&entry)
      .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    use std::fs::OpenOptions;
    use std::io::Write;

    let mut file = OpenOptions::new().create(true).append(true).open(&self.log_file_path)?;
    writeln!(file, "{json_line}")?;
    file.flush()?;

    Ok(())
  }

  /// Retrieve logs with optional level filtering and limiting
  fn get_logs(
    &self,
    limit: Option<usize>,
    level_filter: Option<&str>,
  ) -> std::io::Result<Vec<LogEntry>> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    if !self.log_file_path.exists() {
      return Ok(Vec::new());
    }

    let file = File::open(&self.log_file_path)?;
    let reader = BufReader::new(file);

    let mut logs = Vec::new();

    for line_result in reader.lines() {
      let line = line_result?;
      if line.trim().is_empty() {
        continue;
      }

      // Skip malformed lines rather than failing the whole query
      let Ok(entry) = serde_json::from_str::<LogEntry>(&line) else {
        continue;
      };

      let matches_level =
        level_filter.is_none_or(|filter| filter == "all" || entry.level == filter);

      if matches_level {
        logs.push(entry);
      }
    }

    // Newest first to apply the limit, then oldest first for display
    logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    if let Some(limit) = limit {
      logs.truncate(limit);
    }
    logs.reverse();

    Ok(logs)
  }

  fn has_logs(&self) -> bool {
    self.log_file_path.exists()
      && std::fs::metadata(&self.log_file_path).map(|m| m.len() > 0).unwrap_or(false)
  }
}

impl ServiceLogs {
  /// Create a new thread-safe service log store
  pub fn new<P: AsRef<std::path::Path>>(log_file_path: P) -> std::io::Result<Self> {
    Self::new_with_silent(log_file_path, false)
  }

  /// Create a new thread-safe service log store with silent option
  pub fn new_with_silent<P: AsRef<std::path::Path>>(
    log_file_path: P,
    silent: bool,
  ) -> std::io::Result<Self> {
    let inner = ServiceLogsInner::new(log_file_path, silent)?;
    Ok(Self { inner: std::sync::Arc::new(tokio::sync::Mutex::new(inner)) })
  }

  /// Add a log entry (handles locking internally)
  pub async fn add_log(&self, level: &str, message: &str, component: &str) -> std::io::Result<()> {
    let mut guard = self.inner.lock().await;
    guard.append(level, message, component, None)
  }

  /// Add a log entry with context (handles locking internally)
  pub async fn add_log_with_context(
    &self,
    level: &str,
    message: &str,
    component: &str,
    context: Option<LogContext>,
  ) -> std::io::Result<()> {
    let mut guard = self.inner.lock().await;
    guard.append(level, message, component, context)
  }

  /// Add a log entry (fire-and-forget, ignores errors)
  pub async fn log(&self, level: &str, message: &str, component: &str) {
    let _ = self.add_log(level, message, component).await;
  }

  /// Retrieve logs with optional filtering and limiting
  pub async fn get_logs(
    &self,
    limit: Option<usize>,
    level_filter: Option<&str>,
  ) -> std::io::Result<Vec<LogEntry>> {
    let guard = self.inner.lock().await;
    guard.get_logs(limit, level_filter)
  }

  /// Get the path to the log file
  pub async fn log_file_path(&self) -> std::path::PathBuf {
    let guard = self.inner.lock().await;
    guard.log_file_path.clone()
  }

  /// Check if the log file exists and has content
  pub async fn has_logs(&self) -> bool {
    let guard = self.inner.lock().await;
    guard.has_logs()
  }
}

// Standard Logging Wrappers
// =========================

impl ServiceLogs {
  /// Log an info message (to disk + console unless silent)
  pub async fn info(&self, message: &str, component: &str) {
    self.log("info", message, component).await;

    let guard = self.inner.lock().await;
    if !guard.silent {
      crate::info!(message);
    }
  }

  /// Log an info message with context (to disk + console unless silent)
  pub async fn info_with_context(&self, message: &str, component: &str, context: LogContext) {
    let _ = self.add_log_with_context("info", message, component, Some(context)).await;

    let guard = self.inner.lock().await;
    if !guard.silent {
      crate::info!(message);
    }
  }

  /// Log a warning message (to disk + console unless silent)
  pub async fn warn(&self, message: &str, component: &str) {
    self.log("warn", message, component).await;

    let guard = self.inner.lock().await;
    if !guard.silent {
      crate::warn!(message);
    }
  }

  /// Log an error message (to disk + console unless silent)
  pub async fn error(&self, message: &str, component: &str) {
    self.log("error", message, component).await;

    let guard = self.inner.lock().await;
    if !guard.silent {
      crate::error!(message);
    }
  }

  /// Log a debug message (to disk + console unless silent)
  pub async fn debug(&self, message: &str, component: &str) {
    self.log("debug", message, component).await;

    let guard = self.inner.lock().await;
    if !guard.silent {
      crate::debug!(message);
    }
  }

  /// Log a success message (to disk + console unless silent)
  pub async fn success(&self, message: &str, component: &str) {
    self.log("success", message, component).await;

    let guard = self.inner.lock().await;
    if !guard.silent {
      crate::success!(message);
    }
  }
}
