//! Structured JSONL logging for bridge events.
//!
//! Provides:
//! - [`LogEntry`]: canonical JSONL record with required + optional fields.
//! - [`LogEmitter`]: writes JSONL lines to a file, stderr, or a buffer.
//! - [`log_event`]: process-wide sink configured by `CHURON_LOG`.
//! - [`validate_log_line`] / [`validate_log_text`]: schema checks used by the
//!   build-time harness.
//!
//! Logging must be harmless on the abort path. The process sink is disabled
//! unless `CHURON_LOG` is set, only ever `try_lock`s, and refuses to re-enter
//! itself on the same thread (an allocation failure while logging would
//! otherwise come straight back through the abort bridge).

use std::cell::Cell;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::LogTarget;

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// How the event ended for the operation in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    HostErrorRaised,
    Terminated,
}

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routine: Option<String>,
    /// Exported symbol involved (`R_init_churon`, `abort`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Module handle, hex formatted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Abort policy in effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            routine: None,
            symbol: None,
            handle: None,
            policy: None,
            message: None,
            outcome: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_routine(mut self, routine: impl Into<String>) -> Self {
        self.routine = Some(routine.into());
        self
    }

    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub fn with_handle(mut self, handle: impl std::fmt::Display) -> Self {
        self.handle = Some(handle.to_string());
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

/// Writes structured JSONL log entries to a file, stderr, or memory.
pub struct LogEmitter {
    writer: Box<dyn Write + Send>,
    seq: u64,
    run_id: String,
}

impl LogEmitter {
    /// Create an emitter that appends to a file.
    pub fn to_file(path: &Path, run_id: &str) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(std::io::LineWriter::new(file)),
            seq: 0,
            run_id: run_id.to_string(),
        })
    }

    #[must_use]
    pub fn to_stderr(run_id: &str) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            seq: 0,
            run_id: run_id.to_string(),
        }
    }

    /// Create an emitter over an arbitrary writer (tests, embedders).
    #[must_use]
    pub fn to_writer(writer: Box<dyn Write + Send>, run_id: &str) -> Self {
        Self {
            writer,
            seq: 0,
            run_id: run_id.to_string(),
        }
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("churon::{}::{:03}", self.run_id, self.seq)
    }

    /// Emit a log entry with an auto-generated trace id.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let trace_id = self.next_trace_id();
        let entry = LogEntry::new(trace_id, level, event);
        let line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")?;
        Ok(entry)
    }

    /// Emit a fully-populated log entry, filling in the trace id when empty.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        let line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

// ---------------------------------------------------------------------------
// Process sink
// ---------------------------------------------------------------------------

enum SinkState {
    Unresolved,
    Disabled,
    Active(LogEmitter),
}

static SINK: Mutex<SinkState> = Mutex::new(SinkState::Unresolved);
static EMITTED: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static IN_LOGGER: Cell<bool> = const { Cell::new(false) };
}

fn open_sink(target: &LogTarget) -> SinkState {
    let run_id = std::process::id().to_string();
    match target {
        LogTarget::Off => SinkState::Disabled,
        LogTarget::Stderr => SinkState::Active(LogEmitter::to_stderr(&run_id)),
        LogTarget::File(path) => match LogEmitter::to_file(path, &run_id) {
            Ok(emitter) => SinkState::Active(emitter),
            Err(_) => SinkState::Disabled,
        },
    }
}

/// Route the process sink to `emitter`, or disable it with `None`.
pub fn install_sink(emitter: Option<LogEmitter>) {
    let mut sink = SINK.lock();
    *sink = match emitter {
        Some(emitter) => SinkState::Active(emitter),
        None => SinkState::Disabled,
    };
}

/// Number of entries written through the process sink so far.
#[must_use]
pub fn emitted_count() -> u64 {
    EMITTED.load(Ordering::Relaxed)
}

/// Write one event through the process sink.
///
/// `build` decorates the entry; it only runs when the sink is active. Never
/// blocks: if another thread holds the sink the event is dropped.
pub fn log_event(level: LogLevel, event: &str, build: impl FnOnce(LogEntry) -> LogEntry) {
    if IN_LOGGER.with(Cell::get) {
        return;
    }
    IN_LOGGER.with(|flag| flag.set(true));

    if let Some(mut sink) = SINK.try_lock() {
        if matches!(*sink, SinkState::Unresolved) {
            *sink = open_sink(&LogTarget::from_env());
        }
        if let SinkState::Active(emitter) = &mut *sink {
            let entry = build(LogEntry::new(String::new(), level, event));
            if emitter.emit_entry(entry).is_ok() {
                EMITTED.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    IN_LOGGER.with(|flag| flag.set(false));
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validation error for a log line.
#[derive(Debug)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}: field '{}': {}",
            self.line_number, self.field, self.message
        )
    }
}

const KNOWN_EVENTS: [&str; 7] = [
    "module_load",
    "registration_complete",
    "registration_failed",
    "native_panic_intercepted",
    "abort_intercepted",
    "abort_terminate",
    "host_contract_violation",
];

/// Validate a single JSONL line against the schema.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut errors = Vec::new();
    let error = |field: &str, message: String| LogValidationError {
        line_number,
        field: field.to_string(),
        message,
    };

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return Err(vec![error("<json>", format!("invalid JSON: {e}"))]),
    };

    let Some(obj) = value.as_object() else {
        return Err(vec![error("<root>", "expected JSON object".to_string())]);
    };

    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            errors.push(error(field, "required field missing".to_string()));
        }
    }

    if let Some(level) = obj.get("level").and_then(|v| v.as_str())
        && !["trace", "debug", "info", "warn", "error", "fatal"].contains(&level)
    {
        errors.push(error("level", format!("invalid level: '{level}'")));
    }

    if let Some(event) = obj.get("event").and_then(|v| v.as_str())
        && !KNOWN_EVENTS.contains(&event)
    {
        errors.push(error("event", format!("unknown event: '{event}'")));
    }

    if let Some(policy) = obj.get("policy").and_then(|v| v.as_str())
        && !["raise", "terminate"].contains(&policy)
    {
        errors.push(error("policy", format!("invalid policy: '{policy}'")));
    }

    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str())
        && !trace_id.starts_with("churon::")
    {
        errors.push(error(
            "trace_id",
            format!("trace_id should start with 'churon::': '{trace_id}'"),
        ));
    }

    // Intercepted failures must say how they ended.
    if let Some(event) = obj.get("event").and_then(|v| v.as_str())
        && ["native_panic_intercepted", "abort_intercepted"].contains(&event)
        && obj.get("outcome").is_none()
    {
        errors.push(error(
            "outcome",
            "interception events must record an outcome".to_string(),
        ));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value(value).map_err(|e| vec![error("<schema>", e.to_string())])
}

/// Validate every non-blank line of a JSONL document.
///
/// Returns the number of valid entries, or every error found.
pub fn validate_log_text(text: &str) -> Result<usize, Vec<LogValidationError>> {
    let mut errors = Vec::new();
    let mut valid = 0usize;
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match validate_log_line(line, idx + 1) {
            Ok(_) => valid += 1,
            Err(mut errs) => errors.append(&mut errs),
        }
    }
    if errors.is_empty() {
        Ok(valid)
    } else {
        Err(errors)
    }
}

fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(duration.as_secs(), duration.subsec_millis())
}

/// RFC 3339 stamp for `secs` since the Unix epoch.
fn format_utc(secs: u64, millis: u32) -> String {
    let (year, month, day) = civil_from_days(secs / 86_400);
    let time = secs % 86_400;
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        time / 3600,
        (time % 3600) / 60,
        time % 60,
    )
}

/// Proleptic Gregorian date for a day count since 1970-01-01.
fn civil_from_days(days: u64) -> (u64, u64, u64) {
    // Shift to 0000-03-01 so leap days fall at the end of each 400-year era.
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    (year, month, day)
}
