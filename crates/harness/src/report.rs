//! Console banners, colored verdict lines, and the HTML report

use std::fmt::Write as _;

use crate::summary::{Outcome, RunSummary};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Banner printed before an example runs.
pub fn banner(id: &str) -> String {
    format!("{}--- {} ---{}", BOLD, id, RESET)
}

/// Colored one-line verdict printed after an example.
pub fn verdict_line(id: &str, outcome: &Outcome, duration_ms: u64) -> String {
    match outcome {
        Outcome::Passed => format!("{}✓ {} ({} ms){}", GREEN, id, duration_ms, RESET),
        Outcome::Failed(reason) => format!("{}✗ {} - {}{}", RED, id, reason, RESET),
        Outcome::Skipped(reason) => format!("{}- {} skipped: {}{}", YELLOW, id, reason, RESET),
    }
}

/// Final summary: failure list, not-all-ran warning, or success.
pub fn final_banner(summary: &RunSummary) -> String {
    let mut out = String::new();

    if !summary.failures().is_empty() {
        let _ = writeln!(out, "{}{} example(s) failed:{}", RED, summary.failures().len(), RESET);
        for (id, reason) in summary.failures() {
            let _ = writeln!(out, "{}  ✗ {} - {}{}", RED, id, reason, RESET);
        }
        return out;
    }

    if summary.ran() < summary.selected() {
        let _ = writeln!(
            out,
            "{}All run examples passed, but {} of {} were skipped:{}",
            YELLOW,
            summary.skips().len(),
            summary.selected(),
            RESET
        );
        for (id, reason) in summary.skips() {
            let _ = writeln!(out, "{}  - {} ({}){}", YELLOW, id, reason, RESET);
        }
        return out;
    }

    let _ = writeln!(
        out,
        "{}All {} example(s) passed{}",
        GREEN,
        summary.selected(),
        RESET
    );
    out
}

/// Banner for an interrupted run, distinct from a failing one.
pub fn interrupted_banner(summary: &RunSummary) -> String {
    format!(
        "{}Interrupted after {} of {} example(s){}",
        YELLOW,
        summary.ran() + summary.skips().len(),
        summary.selected(),
        RESET
    )
}

/// One row of the HTML report.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub rel_path: String,
    pub reference: Option<String>,
    pub failed: bool,
    pub skipped: bool,
    pub generated_url: String,
    pub diff_url: Option<String>,
    pub reference_url: Option<String>,
}

impl ReportEntry {
    fn status(&self) -> (&'static str, &'static str) {
        if self.failed {
            ("failed", "#c0392b")
        } else if self.skipped {
            ("skipped", "#f39c12")
        } else {
            ("passed", "#27ae60")
        }
    }
}

/// Render the report page embedding every entry and the version id.
pub fn render_html(entries: &[ReportEntry], version: &str) -> String {
    let mut rows = String::new();
    for entry in entries {
        let (label, color) = entry.status();
        let diff_cell = entry
            .diff_url
            .as_ref()
            .map(|u| format!(r#"<a href="{}">diff</a>"#, u))
            .unwrap_or_else(|| "&mdash;".to_string());
        let reference_cell = entry
            .reference_url
            .as_ref()
            .map(|u| {
                format!(
                    r#"<a href="{}">{}</a>"#,
                    u,
                    entry.reference.as_deref().unwrap_or("reference")
                )
            })
            .unwrap_or_else(|| "&mdash;".to_string());

        let _ = writeln!(
            rows,
            r#"      <tr>
        <td><a href="{generated}">{path}</a></td>
        <td style="color: {color}">{label}</td>
        <td>{diff}</td>
        <td>{reference}</td>
      </tr>"#,
            generated = entry.generated_url,
            path = entry.rel_path,
            color = color,
            label = label,
            diff = diff_cell,
            reference = reference_cell,
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Gallery examples - {version}</title>
  <style>
    body {{ font-family: sans-serif; margin: 2em; }}
    table {{ border-collapse: collapse; }}
    td, th {{ border: 1px solid #ccc; padding: 0.4em 0.8em; text-align: left; }}
  </style>
</head>
<body>
  <h1>Gallery examples &mdash; {version}</h1>
  <table>
    <thead>
      <tr><th>Example</th><th>Status</th><th>Diff</th><th>Reference</th></tr>
    </thead>
    <tbody>
{rows}    </tbody>
  </table>
</body>
</html>
"#,
        version = version,
        rows = rows,
    )
}
