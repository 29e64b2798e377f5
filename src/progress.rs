//! Batch progress reporting.
//!
//! Progress goes to **stderr** so stdout stays parseable for scripts. The
//! runner emits one `Converting` event per finished document.

use std::io::Write;
use std::str::FromStr;

/// A single progress event for a batch run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchProgressEvent {
    /// Walking the input root. Total unknown.
    Discovering { input_dir: String },
    /// `n` documents processed out of `total`.
    Converting { n: u64, total: u64 },
    /// Batch done.
    Finished { ok: u64, failed: u64 },
}

/// Receives progress events from the batch runner.
pub trait BatchProgressReporter: Send + Sync {
    fn report(&self, event: BatchProgressEvent);
}

/// Human-friendly progress on stderr: "clean  converting  1,234 / 5,000 files".
pub struct StderrProgress;

impl BatchProgressReporter for StderrProgress {
    fn report(&self, event: BatchProgressEvent) {
        let line = match &event {
            BatchProgressEvent::Discovering { input_dir } => {
                format!("clean {}  discovering...\n", input_dir)
            }
            BatchProgressEvent::Converting { n, total } => format!(
                "clean  converting  {} / {} files\n",
                format_number(*n),
                format_number(*total)
            ),
            BatchProgressEvent::Finished { ok, failed } => format!(
                "clean  done  {} ok, {} failed\n",
                format_number(*ok),
                format_number(*failed)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BatchProgressReporter for JsonProgress {
    fn report(&self, event: BatchProgressEvent) {
        let obj = match &event {
            BatchProgressEvent::Discovering { input_dir } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "input_dir": input_dir,
            }),
            BatchProgressEvent::Converting { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "converting",
                "n": n,
                "total": total,
            }),
            BatchProgressEvent::Finished { ok, failed } => serde_json::json!({
                "event": "progress",
                "phase": "finished",
                "ok": ok,
                "failed": failed,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BatchProgressReporter for NoProgress {
    fn report(&self, _event: BatchProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BatchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "invalid progress mode '{}': expected off, human or json",
                other
            )),
        }
    }
}
