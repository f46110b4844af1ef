//! Structured logging for the dashboard engine.
//!
//! Every record is one JSON object. Records go to per-run files under
//! `LOG_DIR/RUN_ID/` and are echoed to stderr, which keeps stdout free for
//! published snapshots.
//!
//! - `LOG_LEVEL`: minimum level (default `info`)
//! - `LOG_DOMAINS`: comma-separated domains, or `all`
//! - `LOG_ECHO=0`: file output only

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use crate::transforms::StepReport;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Data,      // Loading, manifests
    Transform, // Store-mutating steps
    Filter,    // Views, bar width
    Cascade,   // Control events, publication
    Table,     // Overview tables
    System,    // Startup, shutdown
    Profile,   // Timing
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Data => "data",
            Domain::Transform => "transform",
            Domain::Filter => "filter",
            Domain::Cascade => "cascade",
            Domain::Table => "table",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
    echo: bool,
}

fn open_log(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match File::create(&path) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            None
        }
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }

        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );

        RunContext {
            events: open_log(run_dir.join("events.jsonl")),
            trace: open_log(run_dir.join("trace.jsonl")),
            echo: std::env::var("LOG_ECHO").as_deref() != Ok("0"),
            run_id,
        }
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["cascade_seq", "region", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(Ok(mut w)) = writer.as_ref().map(|m| m.lock()) {
        let _ = writeln!(w, "{}", line);
    }
}

/// Flushes both run logs. The run context lives for the whole process and
/// is never dropped, so binaries call this before exiting.
pub fn flush() {
    if let Some(ctx) = RUN_CONTEXT.get() {
        for writer in [&ctx.events, &ctx.trace] {
            if let Some(Ok(mut w)) = writer.as_ref().map(|m| m.lock()) {
                let _ = w.flush();
            }
        }
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain.as_str(), event, fields);
}

/// Info-level record keyed by component name, for binaries.
pub fn json_log(module: &str, fields: Map<String, Value>) {
    emit_record(Level::Info, module, module, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    if ctx.echo {
        eprintln!("{}", line);
    }
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_dataset_loaded(rows: usize, regions: usize, forecasts: usize, groups: usize) {
    log(
        Level::Info,
        Domain::Data,
        "dataset_loaded",
        obj(&[
            ("rows", json!(rows)),
            ("regions", json!(regions)),
            ("forecast_rows", json!(forecasts)),
            ("groups", json!(groups)),
        ]),
    );
}

pub fn log_control(cascade_seq: u64, control: &str, detail: Value) {
    log(
        Level::Debug,
        Domain::Cascade,
        "control",
        obj(&[
            ("cascade_seq", json!(cascade_seq)),
            ("control", v_str(control)),
            ("detail", detail),
        ]),
    );
}

/// A control was refused; the previous snapshot stays published.
pub fn log_control_rejected(control: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Cascade,
        "control_rejected",
        obj(&[("control", v_str(control)), ("reason", v_str(reason))]),
    );
}

/// A control value was corrected in place before the cascade ran.
pub fn log_control_corrected(control: &str, reason: &str) {
    log(
        Level::Info,
        Domain::Cascade,
        "control_corrected",
        obj(&[("control", v_str(control)), ("reason", v_str(reason))]),
    );
}

pub fn log_transform_steps(cascade_seq: u64, steps: &StepReport) {
    log(
        Level::Debug,
        Domain::Transform,
        "steps",
        obj(&[
            ("cascade_seq", json!(cascade_seq)),
            ("metric", json!(steps.metric)),
            ("normalization", json!(steps.normalization)),
            ("smoothing", json!(steps.smoothing)),
            ("basis", json!(steps.basis)),
        ]),
    );
}

pub fn log_views(cascade_seq: u64, series: [usize; 2], forecasts: [usize; 2], bar_width: f64) {
    log(
        Level::Debug,
        Domain::Filter,
        "views",
        obj(&[
            ("cascade_seq", json!(cascade_seq)),
            ("series_rows", json!(series)),
            ("forecast_rows", json!(forecasts)),
            ("bar_width", v_num(bar_width)),
        ]),
    );
}

pub fn log_published(cascade_seq: u64, state_hash: u64) {
    log(
        Level::Info,
        Domain::Cascade,
        "published",
        obj(&[
            ("cascade_seq", json!(cascade_seq)),
            ("state_hash", v_str(&format!("{:016x}", state_hash))),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Option<Map<String, Value>>,
    started: Instant,
}

impl ProfileScope {
    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            label,
            context: Some(obj(fields)),
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = self.context.take().unwrap_or_default();
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================
