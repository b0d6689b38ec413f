//! Rolling Logger
//!
//! Daily rolling log files plus an in-memory circular buffer of the most
//! recent lines. The buffer works on every target (including wasm32), so the
//! dashboard can show recent diagnostics without file access.

use std::collections::VecDeque;
use std::fmt;
#[cfg(not(target_arch = "wasm32"))]
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
#[cfg(not(target_arch = "wasm32"))]
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// Lines kept in memory by default
pub const DEFAULT_BUFFER_CAPACITY: usize = 500;
/// Daily log files kept on disk by default
pub const DEFAULT_MAX_FILES: usize = 7;

pub type LoggerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

// ========================
// Circular Buffer
// ========================

/// Shared circular buffer of formatted log lines
#[derive(Clone, Debug)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append a line, evicting the oldest one when full
    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Snapshot of buffered lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Tracing layer that formats every event into a [`LogBuffer`]
pub struct BufferLayer {
    buffer: LogBuffer,
}

impl BufferLayer {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }
}

impl<S: Subscriber> Layer<S> for BufferLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let meta = event.metadata();
        self.buffer.push(format!(
            "{} {:>5} {}: {}",
            Local::now().format("%H:%M:%S%.3f"),
            meta.level(),
            meta.target(),
            visitor.finish()
        ));
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: Vec<String>,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

// ========================
// Rolling Files
// ========================

/// Daily rolling appender writing `<prefix>.<YYYY-MM-DD>.log` into `dir`,
/// keeping at most `max_files` of them.
#[cfg(not(target_arch = "wasm32"))]
pub fn file_appender(
    dir: impl AsRef<Path>,
    prefix: &str,
    max_files: usize,
) -> LoggerResult<RollingFileAppender> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(max_files.max(1))
        .build(dir.as_ref())?;
    Ok(appender)
}

// ========================
// Initialization
// ========================

fn tracing_level(level: log::LevelFilter) -> LevelFilter {
    match level {
        log::LevelFilter::Off => LevelFilter::OFF,
        log::LevelFilter::Error => LevelFilter::ERROR,
        log::LevelFilter::Warn => LevelFilter::WARN,
        log::LevelFilter::Info => LevelFilter::INFO,
        log::LevelFilter::Debug => LevelFilter::DEBUG,
        log::LevelFilter::Trace => LevelFilter::TRACE,
    }
}

/// Install file + buffer logging as the global subscriber.
///
/// Returns the buffer so callers can surface recent lines.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> LoggerResult<LogBuffer> {
    init_logger_with(log_dir, app_name, log::LevelFilter::Info)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn init_logger_with(
    log_dir: impl AsRef<Path>,
    app_name: &str,
    level: log::LevelFilter,
) -> LoggerResult<LogBuffer> {
    let file = file_appender(log_dir, app_name, DEFAULT_MAX_FILES)?;
    let buffer = LogBuffer::new(DEFAULT_BUFFER_CAPACITY);

    #[cfg(target_os = "android")]
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(level)
            .with_tag(app_name),
    );

    tracing_subscriber::registry()
        .with(tracing_level(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file),
        )
        .with(BufferLayer::new(buffer.clone()))
        .try_init()?;

    tracing::info!(app = app_name, "rolling logger initialized");
    Ok(buffer)
}

/// Install buffer-only logging (no file access needed).
pub fn init_buffer_logger(capacity: usize, level: log::LevelFilter) -> LoggerResult<LogBuffer> {
    let buffer = LogBuffer::new(capacity);
    tracing_subscriber::registry()
        .with(tracing_level(level))
        .with(BufferLayer::new(buffer.clone()))
        .try_init()?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_buffer_evicts_oldest() {
        let buffer = LogBuffer::new(2);
        buffer.push("a".into());
        buffer.push("b".into());
        buffer.push("c".into());

        assert_eq!(buffer.lines(), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(buffer.capacity(), 2);
    }

    #[test]
    fn test_buffer_layer_captures_message_and_fields() {
        let buffer = LogBuffer::new(10);
        let subscriber = tracing_subscriber::registry().with(BufferLayer::new(buffer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(task_id = 7, "retracting assignment");
        });

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("WARN"));
        assert!(lines[0].contains("retracting assignment"));
        assert!(lines[0].contains("task_id=7"));
    }

    #[test]
    fn test_file_appender_writes_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let appender = file_appender(dir.path(), "ScreenTime", 3).unwrap();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(appender),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(child_id = "kid-1", "balance refreshed");
        });

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("ScreenTime."));
        assert!(name.ends_with(".log"));
        let content = std::fs::read_to_string(&files[0]).unwrap();
        assert!(content.contains("balance refreshed"));
        assert!(content.contains("kid-1"));
        // Daily files are named by UTC date
        let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(name, format!("ScreenTime.{}.log", today));
    }

    #[test]
    fn test_file_appender_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("screen-time");

        file_appender(&nested, "ScreenTime", 7).unwrap();

        assert!(nested.is_dir());
    }
}
