//! Browser-automation black box
//!
//! The renderer is an external node script invoked per example with
//! `(kind, url, output-image-path, timeout)` positional arguments. It
//! loads the URL, captures a screenshot, and reports diagnostics as a
//! single JSON object on stdout. The shape of that object is a wire
//! contract the harness does not control, so parsing is defensive:
//! unknown keys are ignored and missing keys fall back to a failing
//! default.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::catalog::Kind;
use crate::error::{HarnessError, HarnessResult};

/// Extensions treated as images when classifying resource failures.
const IMAGE_EXTS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    Ok,
    Fail,
}

impl Default for RenderStatus {
    // A report that does not say "ok" is a failure
    fn default() -> Self {
        RenderStatus::Fail
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StackFrame {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptError {
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub trace: Vec<StackFrame>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleMessage {
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceLoad {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: u16,
    #[serde(rename = "statusText", default)]
    pub status_text: String,
}

impl ResourceLoad {
    pub fn failed(&self) -> bool {
        !(200..400).contains(&self.status)
    }

    pub fn is_image(&self) -> bool {
        let url = self.url.to_ascii_lowercase();
        IMAGE_EXTS.iter().any(|ext| url.ends_with(ext))
    }
}

/// The renderer's stdout JSON object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderReport {
    #[serde(default)]
    pub status: RenderStatus,
    #[serde(default)]
    pub errors: Vec<ScriptError>,
    #[serde(default)]
    pub messages: Vec<ConsoleMessage>,
    #[serde(default)]
    pub resources: Vec<ResourceLoad>,
}

/// Verdict derived from a [`RenderReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderVerdict {
    pub failures: Vec<String>,
    pub warnings: Vec<String>,
}

impl RenderVerdict {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

impl RenderReport {
    pub fn from_stdout(stdout: &str) -> HarnessResult<Self> {
        // The script may emit noise before the report; the report is
        // the last line that parses as a JSON object.
        let trimmed = stdout.trim();
        if let Ok(report) = serde_json::from_str(trimmed) {
            return Ok(report);
        }
        for line in trimmed.lines().rev() {
            if let Ok(report) = serde_json::from_str(line.trim()) {
                return Ok(report);
            }
        }
        let head: String = trimmed.chars().take(200).collect();
        Err(HarnessError::Renderer(format!(
            "no JSON report on renderer stdout: {:?}",
            head
        )))
    }

    /// Classify the report into failures and warnings.
    ///
    /// Page-load failure and script errors fail the example. A failed
    /// non-image sub-resource fails it too; failed image resources are
    /// warnings only, since reference images may legitimately not exist
    /// yet.
    pub fn verdict(&self) -> RenderVerdict {
        let mut failures = Vec::new();
        let mut warnings = Vec::new();

        if self.status == RenderStatus::Fail {
            failures.push("page failed to load".to_string());
        }

        for error in &self.errors {
            let location = error
                .trace
                .first()
                .map(|f| format!(" ({}:{})", f.file, f.line))
                .unwrap_or_default();
            failures.push(format!("script error: {}{}", error.msg, location));
        }

        for resource in &self.resources {
            if !resource.failed() {
                continue;
            }
            let line = format!(
                "resource failed to load: {} ({} {})",
                resource.url, resource.status, resource.status_text
            );
            if resource.is_image() {
                warnings.push(line);
            } else {
                failures.push(line);
            }
        }

        RenderVerdict { failures, warnings }
    }
}

/// Invokes the external screenshot script.
pub struct Renderer {
    script: PathBuf,
    timeout: Duration,
}

impl Renderer {
    pub fn new(script: PathBuf, timeout: Duration) -> Self {
        Self { script, timeout }
    }

    /// Load `url` in the browser, write a screenshot to `output`, and
    /// return the parsed diagnostics report.
    ///
    /// The render timeout is owned by the script itself; it is passed
    /// through as the last positional argument.
    pub async fn render(&self, kind: Kind, url: &str, output: &Path) -> HarnessResult<RenderReport> {
        debug!("Rendering {} ({}) -> {}", url, kind, output.display());

        let result = Command::new("node")
            .arg(&self.script)
            .arg(kind.as_str())
            .arg(url)
            .arg(output)
            .arg(self.timeout.as_secs().to_string())
            .output()
            .await;

        let output = match result {
            Ok(out) => out,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Missing node is fatal for the whole run
                return Err(HarnessError::RendererNotFound(self.script.display().to_string()));
            }
            Err(e) => return Err(HarnessError::Io(e)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        RenderReport::from_stdout(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("http://x/plot.png", 404, true; "missing png is a warning")]
    #[test_case("http://x/plot.PNG", 500, true; "extension check is case insensitive")]
    #[test_case("http://x/app.js", 404, false; "missing script is a failure")]
    #[test_case("http://x/data.json", 503, false; "missing data is a failure")]
    fn test_resource_classification(url: &str, status: u16, warning_only: bool) {
        let resource = ResourceLoad {
            url: url.to_string(),
            status,
            status_text: String::new(),
        };
        assert!(resource.failed());
        assert_eq!(resource.is_image(), warning_only);
    }

    #[test]
    fn test_successful_resource_not_failed() {
        let resource = ResourceLoad {
            url: "http://x/app.js".to_string(),
            status: 200,
            status_text: "OK".to_string(),
        };
        assert!(!resource.failed());
    }

    #[test]
    fn test_clean_report_passes() {
        let report = RenderReport::from_stdout(
            r#"{"status": "ok", "errors": [], "messages": [], "resources": []}"#,
        )
        .unwrap();
        let verdict = report.verdict();
        assert!(verdict.passed());
        assert!(verdict.warnings.is_empty());
    }

    #[test]
    fn test_fail_status_is_failure() {
        let report = RenderReport::from_stdout(r#"{"status": "fail"}"#).unwrap();
        assert!(!report.verdict().passed());
    }

    #[test]
    fn test_missing_status_defaults_to_failure() {
        let report = RenderReport::from_stdout(r#"{"errors": []}"#).unwrap();
        assert!(!report.verdict().passed());
    }

    #[test]
    fn test_script_errors_fail() {
        let report = RenderReport::from_stdout(
            r#"{"status": "ok", "errors": [{"msg": "x is undefined", "trace": [{"file": "app.js", "line": 12}]}]}"#,
        )
        .unwrap();
        let verdict = report.verdict();
        assert_eq!(verdict.failures, vec!["script error: x is undefined (app.js:12)"]);
    }

    #[test]
    fn test_non_image_resource_failure_fails() {
        let report = RenderReport::from_stdout(
            r#"{"status": "ok", "resources": [{"url": "http://x/app.js", "status": 404, "statusText": "Not Found"}]}"#,
        )
        .unwrap();
        let verdict = report.verdict();
        assert!(!verdict.passed());
    }

    #[test]
    fn test_image_resource_failure_is_warning() {
        let report = RenderReport::from_stdout(
            r#"{"status": "ok", "resources": [{"url": "http://x/ref.png", "status": 404, "statusText": "Not Found"}]}"#,
        )
        .unwrap();
        let verdict = report.verdict();
        assert!(verdict.passed());
        assert_eq!(verdict.warnings.len(), 1);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let report = RenderReport::from_stdout(
            r#"{"status": "ok", "timing": {"load": 120}, "extra": true}"#,
        )
        .unwrap();
        assert!(report.verdict().passed());
    }

    #[test]
    fn test_report_on_last_line_of_noisy_stdout() {
        let stdout = "npm warn something\nloading page\n{\"status\": \"ok\"}\n";
        let report = RenderReport::from_stdout(stdout).unwrap();
        assert_eq!(report.status, RenderStatus::Ok);
    }

    #[test]
    fn test_garbage_stdout_is_renderer_error() {
        let err = RenderReport::from_stdout("segfault").unwrap_err();
        assert!(matches!(err, HarnessError::Renderer(_)));
    }
}
