//! Upload progress reporting.
//!
//! Reports per-file progress during `docchat upload` so users see which file
//! is being sent and how many are left. Progress is emitted on **stderr** so
//! stdout (the upload summary) remains parseable for scripts.

use std::io::Write;

/// A single progress event for an upload batch.
#[derive(Clone, Debug, PartialEq)]
pub enum UploadProgressEvent {
    /// File `index` (1-based) of `total` is being sent.
    Started {
        file: String,
        index: usize,
        total: usize,
    },
    /// File stored at `uri`.
    Finished { file: String, uri: String },
    /// File skipped or rejected.
    Failed { file: String, reason: String },
}

/// Reports upload progress. Implementations write to stderr (human or JSON).
pub trait UploadProgressReporter: Send + Sync {
    fn report(&self, event: UploadProgressEvent);
}

/// Human-friendly progress on stderr: "upload [2/5] report.pdf  sending...".
pub struct StderrProgress;

impl UploadProgressReporter for StderrProgress {
    fn report(&self, event: UploadProgressEvent) {
        let line = match &event {
            UploadProgressEvent::Started { file, index, total } => {
                format!("upload [{}/{}] {}  sending...\n", index, total, file)
            }
            UploadProgressEvent::Finished { file, uri } => {
                format!("upload {}  done -> {}\n", file, uri)
            }
            UploadProgressEvent::Failed { file, reason } => {
                format!("upload {}  failed: {}\n", file, reason)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl UploadProgressReporter for JsonProgress {
    fn report(&self, event: UploadProgressEvent) {
        let obj = event_json(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

fn event_json(event: &UploadProgressEvent) -> serde_json::Value {
    match event {
        UploadProgressEvent::Started { file, index, total } => serde_json::json!({
            "event": "progress",
            "file": file,
            "phase": "sending",
            "n": index,
            "total": total
        }),
        UploadProgressEvent::Finished { file, uri } => serde_json::json!({
            "event": "progress",
            "file": file,
            "phase": "done",
            "uri": uri
        }),
        UploadProgressEvent::Failed { file, reason } => serde_json::json!({
            "event": "progress",
            "file": file,
            "phase": "failed",
            "reason": reason
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl UploadProgressReporter for NoProgress {
    fn report(&self, _event: UploadProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn UploadProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_event_json() {
        let v = event_json(&UploadProgressEvent::Started {
            file: "a.pdf".to_string(),
            index: 2,
            total: 5,
        });
        assert_eq!(v["phase"], "sending");
        assert_eq!(v["n"], 2);
        assert_eq!(v["total"], 5);
    }

    #[test]
    fn failed_event_json_carries_reason() {
        let v = event_json(&UploadProgressEvent::Failed {
            file: "b.pdf".to_string(),
            reason: "not a PDF".to_string(),
        });
        assert_eq!(v["phase"], "failed");
        assert_eq!(v["reason"], "not a PDF");
    }
}
