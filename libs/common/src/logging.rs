//! Unified logging module for the recipe tools
//!
//! Console output plus an optional daily rolling log file, with background
//! compression of old files. The level filter is fixed at init: `RUST_LOG`
//! when set, otherwise the configured console level.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{
        self,
        format::{FmtSpan, Writer},
        FmtContext, FormatEvent, FormatFields,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809Z [INFO] Fetched 412 recipes`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Global guards for keeping file loggers alive
static GUARDS: OnceLock<Arc<Mutex<Vec<WorkerGuard>>>> = OnceLock::new();

// ============================================================================
// Log Root Directory Configuration
// ============================================================================

/// Global log root directory
/// Priority: RECIPE_LOG_DIR env > config_dir > default "logs"
static LOG_ROOT: OnceLock<PathBuf> = OnceLock::new();

/// Initialize log root directory from config or environment
///
/// Priority:
/// 1. `RECIPE_LOG_DIR` environment variable (highest)
/// 2. `config_dir` parameter
/// 3. Default value "logs" (lowest)
pub fn init_log_root(config_dir: Option<&str>) {
    LOG_ROOT.get_or_init(|| {
        std::env::var("RECIPE_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                config_dir
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("logs"))
            })
    });
}

/// Get log root directory
///
/// Falls back to the environment or "logs" when `init_log_root` was not called.
/// Test binaries default to the system temp directory.
pub fn get_log_root() -> PathBuf {
    LOG_ROOT.get().cloned().unwrap_or_else(|| {
        std::env::var("RECIPE_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                if is_test_environment() {
                    std::env::temp_dir().join("recipe-test-logs")
                } else {
                    PathBuf::from("logs")
                }
            })
    })
}

/// Detect if we're running in a test environment
fn is_test_environment() -> bool {
    if std::env::var("CARGO_TARGET_TMPDIR").is_ok() {
        return true;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(path_str) = exe.to_str() {
            if path_str.contains("target/debug/deps") || path_str.contains("target/release/deps") {
                return true;
            }
        }
    }

    false
}

/// Default max file size: 100MB
const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

// Daily rolling file writer with naming format: {YYYYMMDD}_{service}.log
// Also rotates by size within a day: {YYYYMMDD}_{service}.{N}.log
struct DailyRollingWriter {
    service_name: String,
    log_dir: PathBuf,
    current_date: Arc<Mutex<String>>,
    current_file: Arc<Mutex<Option<File>>>,
    /// Current file size in bytes
    current_size: Arc<AtomicU64>,
    max_file_size: u64,
    /// Rotation counter within the same day
    rotation_count: Arc<AtomicU32>,
}

impl DailyRollingWriter {
    fn with_max_size(
        service_name: String,
        log_dir: PathBuf,
        max_file_size: u64,
    ) -> std::io::Result<Self> {
        let current_date = chrono::Local::now().format("%Y%m%d").to_string();
        let file_path = log_dir.join(format!("{}_{}.log", current_date, service_name));

        fs::create_dir_all(&log_dir)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;
        let initial_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            service_name,
            log_dir,
            current_date: Arc::new(Mutex::new(current_date)),
            current_file: Arc::new(Mutex::new(Some(file))),
            current_size: Arc::new(AtomicU64::new(initial_size)),
            max_file_size,
            rotation_count: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Rotate the log file due to size limit
    fn rotate_by_size(&self) -> std::io::Result<()> {
        let current_date = self
            .current_date
            .lock()
            .map_err(|e| std::io::Error::other(format!("Mutex poisoned: {}", e)))?;

        let count = self.rotation_count.fetch_add(1, Ordering::SeqCst) + 1;

        let new_file_path = self.log_dir.join(format!(
            "{}_{}.{}.log",
            *current_date, self.service_name, count
        ));

        let new_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&new_file_path)?;

        self.current_size.store(0, Ordering::SeqCst);

        let mut current_file = self
            .current_file
            .lock()
            .map_err(|e| std::io::Error::other(format!("Mutex poisoned: {}", e)))?;
        *current_file = Some(new_file);

        Ok(())
    }

    fn get_writer(&self) -> std::io::Result<std::sync::MutexGuard<'_, Option<File>>> {
        let today = chrono::Local::now().format("%Y%m%d").to_string();
        let mut current_date = self
            .current_date
            .lock()
            .map_err(|e| std::io::Error::other(format!("Mutex poisoned: {}", e)))?;

        if *current_date != today {
            let new_file_path = self
                .log_dir
                .join(format!("{}_{}.log", today, self.service_name));

            fs::create_dir_all(&self.log_dir)?;

            let new_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&new_file_path)?;
            let initial_size = new_file.metadata().map(|m| m.len()).unwrap_or(0);

            *current_date = today;
            self.rotation_count.store(0, Ordering::SeqCst);
            self.current_size.store(initial_size, Ordering::SeqCst);

            let mut current_file = self
                .current_file
                .lock()
                .map_err(|e| std::io::Error::other(format!("Mutex poisoned: {}", e)))?;
            *current_file = Some(new_file);
        }

        self.current_file
            .lock()
            .map_err(|e| std::io::Error::other(format!("Mutex poisoned: {}", e)))
    }
}

impl std::io::Write for DailyRollingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let current_size = self.current_size.load(Ordering::Relaxed);
        if current_size > 0 && current_size + buf.len() as u64 > self.max_file_size {
            self.rotate_by_size()?;
        }

        if let Some(ref mut file) = *self.get_writer()? {
            let written = file.write(buf)?;
            self.current_size
                .fetch_add(written as u64, Ordering::Relaxed);
            Ok(written)
        } else {
            Ok(0)
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut file) = *self.get_writer()? {
            file.flush()
        } else {
            Ok(())
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, also used as the log file stem (e.g., "recipectl")
    pub service_name: String,
    /// Base directory for log files
    pub log_dir: PathBuf,
    /// Base level when RUST_LOG is not set
    pub console_level: Level,
    /// Write a daily rolling log file in addition to the console
    pub enable_file: bool,
    /// Enable JSON format for the file layer
    pub enable_json: bool,
    /// Size limit of a single log file before rotating
    pub max_file_size: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            log_dir: get_log_root(),
            console_level: Level::INFO,
            enable_file: false,
            enable_json: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Build the filter string used when RUST_LOG is absent
fn default_filter(config: &LogConfig) -> String {
    let base = config.console_level.as_str().to_lowercase();
    if config.console_level == Level::INFO {
        format!("{},{}=debug", base, config.service_name.replace('-', "_"))
    } else {
        base
    }
}

/// Initialize logging system with configuration
pub fn init_with_config(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(&config));
    let env_filter = EnvFilter::try_new(&filter_str)?;

    let registry = tracing_subscriber::registry().with(env_filter);

    // Console goes to stderr so stdout stays clean for command output
    let console_layer = fmt::layer()
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = if config.enable_file {
        let writer = DailyRollingWriter::with_max_size(
            config.service_name.clone(),
            config.log_dir.clone(),
            config.max_file_size,
        )?;
        let (non_blocking, guard) = tracing_appender::non_blocking(writer);

        let guards = GUARDS.get_or_init(|| Arc::new(Mutex::new(Vec::new())));
        match guards.lock() {
            Ok(mut guards) => guards.push(guard),
            Err(poisoned) => {
                eprintln!("Warning: GUARDS lock was poisoned, recovering...");
                poisoned.into_inner().push(guard);
            },
        }

        let layer = if config.enable_json {
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_level(true)
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .event_format(BracketedLevelFormat)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    registry.with(console_layer).with(file_layer).try_init()?;

    if config.enable_file {
        tracing::debug!("Logging: {} @ {:?}", config.service_name, config.log_dir);
        // Compression needs a runtime; short-lived callers without one skip it
        if tokio::runtime::Handle::try_current().is_ok() {
            start_log_compression_task(config.log_dir, config.service_name);
        }
    }

    Ok(())
}

// ==================== Log Compression Support ====================

use tokio::time::{interval, Duration};

/// Start background log compression task
pub fn start_log_compression_task(log_dir: PathBuf, service_name: String) {
    tokio::spawn(async move {
        // Initial delay of 1 minute so short commands never pay for it
        tokio::time::sleep(Duration::from_secs(60)).await;

        let mut interval = interval(Duration::from_secs(86400));

        loop {
            interval.tick().await;
            if let Err(e) = compress_old_logs(&log_dir, &service_name).await {
                tracing::error!("Log compression error for {}: {}", service_name, e);
            }
        }
    });
}

/// Compress log files older than 7 days, delete compressed logs older than 365 days
async fn compress_old_logs(
    log_dir: &Path,
    service_name: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use std::time::SystemTime;

    let mut entries = tokio::fs::read_dir(log_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };

        if !is_service_log(&file_name, service_name) {
            continue;
        }

        let metadata = tokio::fs::metadata(&path).await?;
        let modified = metadata.modified()?;
        let age = SystemTime::now().duration_since(modified)?;

        if !file_name.ends_with(".gz") {
            if age > Duration::from_secs(7 * 86400) {
                compress_file(&path)?;
                tokio::fs::remove_file(&path).await?;
                tracing::debug!("Compressed: {}", file_name);
            }
        } else if age > Duration::from_secs(365 * 86400) {
            tokio::fs::remove_file(&path).await?;
            tracing::debug!("Deleted: {}", file_name);
        }
    }

    Ok(())
}

/// `{YYYYMMDD}_{service}.log`, `{YYYYMMDD}_{service}.{N}.log` and their `.gz` forms
fn is_service_log(file_name: &str, service_name: &str) -> bool {
    let stem = file_name.strip_suffix(".gz").unwrap_or(file_name);
    let Some(rest) = stem.strip_suffix(".log") else {
        return false;
    };
    let Some((date, tail)) = rest.split_once('_') else {
        return false;
    };
    if date.len() != 8 || !date.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match tail.strip_prefix(service_name) {
        Some("") => true,
        Some(suffix) => suffix
            .strip_prefix('.')
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit())),
        None => false,
    }
}

/// Compress a single file next to itself (`name.log` -> `name.log.gz`)
fn compress_file(path: &Path) -> std::io::Result<PathBuf> {
    let buffer = fs::read(path)?;

    let output_path = PathBuf::from(format!("{}.gz", path.display()));
    let output = File::create(&output_path)?;
    let mut encoder = GzEncoder::new(output, Compression::best());
    encoder.write_all(&buffer)?;
    encoder.finish()?;

    Ok(output_path)
}

// ============================================================================
// Payload logging helpers
// ============================================================================

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "token",
    "apikey",
    "api_key",
    "secret",
    "authorization",
];

/// Redact sensitive fields in JSON string
///
/// Recursively replaces the values of keys that look like credentials with
/// "***REDACTED***". Non-JSON input is returned unchanged.
pub fn redact_sensitive_fields(json_str: &str) -> String {
    use serde_json::Value;

    let Ok(mut value) = serde_json::from_str::<Value>(json_str) else {
        return json_str.to_string();
    };

    fn redact_recursive(value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    if SENSITIVE_KEYS.iter().any(|&k| key_lower.contains(k)) {
                        *val = Value::String("***REDACTED***".to_string());
                    } else {
                        redact_recursive(val);
                    }
                }
            },
            Value::Array(arr) => {
                for item in arr.iter_mut() {
                    redact_recursive(item);
                }
            },
            _ => {},
        }
    }

    redact_recursive(&mut value);

    serde_json::to_string(&value).unwrap_or_else(|_| json_str.to_string())
}

/// Truncate body string to at most `max_length` characters
///
/// A suffix records how many characters were dropped.
pub fn truncate_body(body: &str, max_length: usize) -> String {
    let total = body.chars().count();
    if total <= max_length {
        body.to_string()
    } else {
        let kept: String = body.chars().take(max_length).collect();
        format!("{}[truncated {} chars]", kept, total - max_length)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_redact_sensitive_fields() {
        let json = r#"{"title":"Focaccia","apikey":"abc","nested":{"access_token":"xyz"}}"#;
        let redacted = redact_sensitive_fields(json);
        assert!(redacted.contains("Focaccia"));
        assert!(!redacted.contains("abc"));
        assert!(!redacted.contains("xyz"));
        assert_eq!(redacted.matches("***REDACTED***").count(), 2);
    }

    #[test]
    fn test_redact_non_json_passthrough() {
        assert_eq!(redact_sensitive_fields("boom"), "boom");
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short", 10), "short");
        assert_eq!(truncate_body("abcdef", 3), "abc[truncated 3 chars]");
        // Multibyte characters are never split
        assert_eq!(truncate_body("çğüşö", 2), "çğ[truncated 3 chars]");
    }

    #[test]
    fn test_default_filter() {
        let config = LogConfig {
            service_name: "recipe-ctl".to_string(),
            ..Default::default()
        };
        assert_eq!(default_filter(&config), "info,recipe_ctl=debug");

        let config = LogConfig {
            console_level: Level::WARN,
            ..config
        };
        assert_eq!(default_filter(&config), "warn");
    }

    #[test]
    fn test_is_service_log() {
        assert!(is_service_log("20250101_recipectl.log", "recipectl"));
        assert!(is_service_log("20250101_recipectl.3.log", "recipectl"));
        assert!(is_service_log("20250101_recipectl.log.gz", "recipectl"));
        assert!(!is_service_log("20250101_other.log", "recipectl"));
        assert!(!is_service_log("notes.txt", "recipectl"));
        assert!(!is_service_log("2025_recipectl.log", "recipectl"));
    }

    #[test]
    fn test_daily_writer_rotates_by_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            DailyRollingWriter::with_max_size("recipectl".into(), dir.path().to_path_buf(), 16)
                .unwrap();

        writer.write_all(b"0123456789").unwrap();
        writer.write_all(b"0123456789").unwrap();
        writer.flush().unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();

        assert_eq!(names.len(), 2);
        assert!(names.iter().any(|n| n.ends_with("_recipectl.log")));
        assert!(names.iter().any(|n| n.ends_with("_recipectl.1.log")));
    }

    #[test]
    fn test_compress_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20240101_recipectl.log");
        fs::write(&path, "line one\nline two\n").unwrap();

        let gz = compress_file(&path).unwrap();
        assert!(gz.to_string_lossy().ends_with(".log.gz"));

        let mut decoder = flate2::read::GzDecoder::new(File::open(gz).unwrap());
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        assert_eq!(out, "line one\nline two\n");
    }
}
