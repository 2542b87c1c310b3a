//! Streaming progress reports.
//!
//! Two modes share one call surface: human-readable text lines and one JSON
//! object per line. Reporters are pure observers; they never influence pass
//! execution.

use serde_json::json;
use std::io::Write;
use std::sync::Mutex;

/// Output format for progress records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressFormat {
    #[default]
    Text,
    Json,
}

/// Streams progress, error, and success records to stdout (or a capture sink).
pub struct ProgressReporter {
    format: ProgressFormat,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl ProgressReporter {
    pub fn new(format: ProgressFormat) -> Self {
        Self {
            format,
            sink: Mutex::new(Box::new(std::io::stdout())),
        }
    }

    /// Route records into an arbitrary writer. Used by tests.
    pub fn with_sink(format: ProgressFormat, sink: Box<dyn Write + Send>) -> Self {
        Self {
            format,
            sink: Mutex::new(sink),
        }
    }

    /// Report a progress update. `progress` is 0.0–1.0, or negative for
    /// indeterminate. `details` is optional free text.
    pub fn report(&self, operation: &str, message: &str, progress: f64, details: &str) {
        let mut sink = self.sink.lock().expect("progress sink poisoned");
        match self.format {
            ProgressFormat::Json => {
                let mut record = json!({
                    "type": "progress",
                    "operation": operation,
                    "message": message,
                });
                if progress >= 0.0 {
                    record["progress"] = json!((progress * 10000.0).round() / 10000.0);
                }
                if !details.is_empty() {
                    record["details"] = json!(details);
                }
                let _ = writeln!(sink, "{record}");
            }
            ProgressFormat::Text => {
                let _ = if progress >= 0.0 {
                    let percent = (progress * 100.0) as i64;
                    if details.is_empty() {
                        writeln!(sink, "[{operation}] {message} ({percent}%)")
                    } else {
                        writeln!(sink, "[{operation}] {message} ({percent}%) - {details}")
                    }
                } else if details.is_empty() {
                    writeln!(sink, "[{operation}] {message}")
                } else {
                    writeln!(sink, "[{operation}] {message} - {details}")
                };
            }
        }
    }

    /// Report a terminal failure for the operation.
    pub fn error(&self, operation: &str, message: &str) {
        let mut sink = self.sink.lock().expect("progress sink poisoned");
        let _ = match self.format {
            ProgressFormat::Json => writeln!(
                sink,
                "{}",
                json!({ "type": "error", "operation": operation, "message": message })
            ),
            ProgressFormat::Text => writeln!(sink, "Error [{operation}]: {message}"),
        };
    }

    /// Report overall success for the operation.
    pub fn success(&self, operation: &str, message: &str) {
        let mut sink = self.sink.lock().expect("progress sink poisoned");
        let _ = match self.format {
            ProgressFormat::Json => writeln!(
                sink,
                "{}",
                json!({ "type": "success", "operation": operation, "message": message })
            ),
            ProgressFormat::Text => writeln!(sink, "\u{2713} {message}"),
        };
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(ProgressFormat::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<StdMutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn captured(format: ProgressFormat, f: impl FnOnce(&ProgressReporter)) -> String {
        let capture = Capture::default();
        let reporter = ProgressReporter::with_sink(format, Box::new(capture.clone()));
        f(&reporter);
        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn text_mode_formats_percent_and_details() {
        let out = captured(ProgressFormat::Text, |p| {
            p.report("merge", "Loading file", 0.25, "model.gltf");
        });
        assert_eq!(out, "[merge] Loading file (25%) - model.gltf\n");
    }

    #[test]
    fn json_mode_emits_one_object_per_line() {
        let out = captured(ProgressFormat::Json, |p| {
            p.report("dedupe", "scanning", 0.5, "");
            p.error("dedupe", "boom");
        });
        let mut lines = out.lines();
        let progress: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(progress["type"], "progress");
        assert_eq!(progress["progress"], 0.5);
        assert!(progress.get("details").is_none());

        let error: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], "boom");
    }

    #[test]
    fn indeterminate_progress_omits_percent() {
        let out = captured(ProgressFormat::Text, |p| {
            p.report("weld", "working", -1.0, "");
        });
        assert_eq!(out, "[weld] working\n");
    }
}
