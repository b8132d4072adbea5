//! Outcome aggregation and the exit-code contract

use serde::Serialize;
use tracing::info;

/// Final state of one example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    Skipped(String),
}

/// Mutable run state, owned by the single control thread.
///
/// `ran` counts examples actually executed; skipped examples are listed
/// but never counted as run. Fail and skip lists keep encounter order.
#[derive(Debug, Clone)]
pub struct RunSummary {
    selected: usize,
    ran: usize,
    failures: Vec<(String, String)>,
    skips: Vec<(String, String)>,
}

impl RunSummary {
    pub fn new(selected: usize) -> Self {
        Self {
            selected,
            ran: 0,
            failures: Vec::new(),
            skips: Vec::new(),
        }
    }

    pub fn record(&mut self, id: &str, outcome: &Outcome) {
        match outcome {
            Outcome::Passed => self.ran += 1,
            Outcome::Failed(reason) => {
                self.ran += 1;
                self.failures.push((id.to_string(), reason.clone()));
            }
            Outcome::Skipped(reason) => {
                self.skips.push((id.to_string(), reason.clone()));
            }
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn ran(&self) -> usize {
        self.ran
    }

    pub fn passed(&self) -> usize {
        self.ran - self.failures.len()
    }

    pub fn failures(&self) -> &[(String, String)] {
        &self.failures
    }

    pub fn skips(&self) -> &[(String, String)] {
        &self.skips
    }

    pub fn failed(&self, id: &str) -> bool {
        self.failures.iter().any(|(f, _)| f == id)
    }

    pub fn skipped(&self, id: &str) -> bool {
        self.skips.iter().any(|(s, _)| s == id)
    }

    /// True once every selected example has an outcome.
    pub fn complete(&self) -> bool {
        self.ran + self.skips.len() == self.selected
    }

    /// Exit-code policy: failures win; skips alone still exit 0.
    pub fn exit_code(&self) -> i32 {
        if self.failures.is_empty() {
            0
        } else {
            1
        }
    }

    /// Serializable snapshot for the JSON results file.
    pub fn to_report(&self, duration_ms: u64) -> RunReport {
        RunReport {
            selected: self.selected,
            ran: self.ran,
            passed: self.passed(),
            duration_ms,
            failures: self
                .failures
                .iter()
                .map(|(id, reason)| OutcomeEntry {
                    example: id.clone(),
                    reason: reason.clone(),
                })
                .collect(),
            skips: self
                .skips
                .iter()
                .map(|(id, reason)| OutcomeEntry {
                    example: id.clone(),
                    reason: reason.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeEntry {
    pub example: String,
    pub reason: String,
}

/// JSON results file contents.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub selected: usize,
    pub ran: usize,
    pub passed: usize,
    pub duration_ms: u64,
    pub failures: Vec<OutcomeEntry>,
    pub skips: Vec<OutcomeEntry>,
}

impl RunReport {
    pub fn write(&self, dir: &std::path::Path) -> crate::error::HarnessResult<std::path::PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("run-results.json");
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
