//! Notebook output-cell policy
//!
//! Notebooks are expected to be checked in without stored outputs. The
//! policy decides what happens when a code cell has output anyway.

use clap::ValueEnum;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputCellsPolicy {
    /// Any non-empty output cell fails the notebook
    Complain,
    /// Strip outputs, persist the file, continue with a warning
    Remove,
    /// No check at all
    Ignore,
}

/// Result of applying the policy to one notebook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellCheck {
    /// No code cell had output (or the policy was ignore)
    Clean,
    /// Dirty cells found under the complain policy
    Dirty(usize),
    /// Outputs stripped and the file rewritten
    Removed(usize),
}

/// Inspect (and under `remove`, rewrite) the notebook at `path`.
pub fn apply_output_policy(path: &Path, policy: OutputCellsPolicy) -> HarnessResult<CellCheck> {
    if policy == OutputCellsPolicy::Ignore {
        return Ok(CellCheck::Clean);
    }

    let raw = std::fs::read_to_string(path)?;
    let mut notebook: Value = serde_json::from_str(&raw)
        .map_err(|e| HarnessError::Notebook(format!("{}: {}", path.display(), e)))?;

    let cells = notebook
        .get_mut("cells")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| HarnessError::Notebook(format!("{}: no cells array", path.display())))?;

    let mut dirty = 0;
    for cell in cells.iter_mut() {
        if cell.get("cell_type").and_then(Value::as_str) != Some("code") {
            continue;
        }
        let has_output = cell
            .get("outputs")
            .and_then(Value::as_array)
            .map(|o| !o.is_empty())
            .unwrap_or(false);
        if !has_output {
            continue;
        }
        dirty += 1;
        if policy == OutputCellsPolicy::Remove {
            cell["outputs"] = Value::Array(vec![]);
            cell["execution_count"] = Value::Null;
        }
    }

    if dirty == 0 {
        return Ok(CellCheck::Clean);
    }

    match policy {
        OutputCellsPolicy::Complain => Ok(CellCheck::Dirty(dirty)),
        OutputCellsPolicy::Remove => {
            debug!("Stripping output from {} cell(s) in {}", dirty, path.display());
            std::fs::write(path, serde_json::to_string_pretty(&notebook)?)?;
            Ok(CellCheck::Removed(dirty))
        }
        OutputCellsPolicy::Ignore => unreachable!("ignore returns early"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_notebook(dir: &TempDir, outputs: &str) -> PathBuf {
        let path = dir.path().join("demo.ipynb");
        let body = format!(
            r##"{{
  "nbformat": 4,
  "cells": [
    {{"cell_type": "markdown", "source": ["# Demo"]}},
    {{"cell_type": "code", "execution_count": 3, "source": ["plot()"], "outputs": {}}}
  ]
}}"##,
            outputs
        );
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_clean_notebook() {
        let tmp = TempDir::new().unwrap();
        let path = write_notebook(&tmp, "[]");
        assert_eq!(
            apply_output_policy(&path, OutputCellsPolicy::Complain).unwrap(),
            CellCheck::Clean
        );
    }

    #[test]
    fn test_complain_on_dirty_cell() {
        let tmp = TempDir::new().unwrap();
        let path = write_notebook(&tmp, r#"[{"output_type": "stream", "text": ["hi"]}]"#);
        assert_eq!(
            apply_output_policy(&path, OutputCellsPolicy::Complain).unwrap(),
            CellCheck::Dirty(1)
        );
    }

    #[test]
    fn test_remove_strips_and_persists() {
        let tmp = TempDir::new().unwrap();
        let path = write_notebook(&tmp, r#"[{"output_type": "stream", "text": ["hi"]}]"#);

        assert_eq!(
            apply_output_policy(&path, OutputCellsPolicy::Remove).unwrap(),
            CellCheck::Removed(1)
        );

        // A second pass sees a clean notebook
        assert_eq!(
            apply_output_policy(&path, OutputCellsPolicy::Complain).unwrap(),
            CellCheck::Clean
        );

        let rewritten: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rewritten["cells"][1]["execution_count"], Value::Null);
    }

    #[test]
    fn test_ignore_skips_parse() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.ipynb");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(
            apply_output_policy(&path, OutputCellsPolicy::Ignore).unwrap(),
            CellCheck::Clean
        );
    }

    #[test]
    fn test_markdown_cells_never_dirty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("md.ipynb");
        std::fs::write(
            &path,
            r#"{"cells": [{"cell_type": "markdown", "outputs": [{"x": 1}]}]}"#,
        )
        .unwrap();
        assert_eq!(
            apply_output_policy(&path, OutputCellsPolicy::Complain).unwrap(),
            CellCheck::Clean
        );
    }
}
