//! Example discovery from the declarative gallery manifest
//!
//! The manifest lists example directories with an optional forced kind
//! and per-directory skip lists. Each directory is walked once at
//! startup to materialize a flat catalog of [`Example`]s; nothing here
//! is mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

/// Extension of runnable example scripts.
pub const SCRIPT_EXT: &str = "py";

/// Extension of notebook examples.
pub const NOTEBOOK_EXT: &str = "ipynb";

/// How an example is executed and addressed for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Standalone script producing an HTML file next to itself
    File,
    /// Script served by the render server
    Server,
    /// Notebook served by the notebook kernel server
    Notebook,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::File => "file",
            Kind::Server => "server",
            Kind::Notebook => "notebook",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution kind plus orthogonal modifiers.
///
/// Exactly one kind is guaranteed by the enum; the constructor rejects
/// the one illegal modifier combination (animated file examples).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub kind: Kind,
    pub animated: bool,
    pub skip: bool,
}

impl Flags {
    pub fn new(name: &str, kind: Kind, animated: bool) -> HarnessResult<Self> {
        if animated && kind == Kind::File {
            return Err(HarnessError::InvalidFlags {
                name: name.to_string(),
                reason: "file examples cannot be animated".to_string(),
            });
        }
        Ok(Self {
            kind,
            animated,
            skip: false,
        })
    }

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }
}

/// A single runnable example. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub path: PathBuf,
    pub flags: Flags,
}

impl Example {
    /// Location identifier used for selection, ordering, and banners.
    pub fn id(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// File stem, used to build server URLs and artifact names.
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Path relative to the gallery root, used for notebook URLs and
    /// store keys. Falls back to the full path if the example lives
    /// outside the root.
    pub fn rel_path(&self, gallery_root: &Path) -> PathBuf {
        self.path
            .strip_prefix(gallery_root)
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| self.path.clone())
    }

    /// Where the generated screenshot lives, next to the example source.
    pub fn screenshot_path(&self, version: &str) -> PathBuf {
        self.sibling(&format!("{}-{}.png", self.base_name(), version))
    }

    /// Where the visual diff image lives, next to the example source.
    pub fn diff_path(&self, version: &str) -> PathBuf {
        self.sibling(&format!("{}-{}-diff.png", self.base_name(), version))
    }

    /// The HTML output a file-kind example is expected to produce.
    pub fn html_output_path(&self) -> PathBuf {
        self.sibling(&format!("{}.html", self.base_name()))
    }

    fn sibling(&self, name: &str) -> PathBuf {
        self.path
            .parent()
            .map(|p| p.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

/// One entry of the gallery manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Directory to list, relative to the manifest's own directory
    pub dir: PathBuf,

    /// Force every script in the directory to this kind
    #[serde(default)]
    pub kind: Option<Kind>,

    /// Filenames never run, in any mode
    #[serde(default)]
    pub skip: Vec<String>,

    /// Filenames additionally skipped on CI (ignored in all-notebooks mode)
    #[serde(default)]
    pub skip_on_ci: Vec<String>,
}

/// The parsed manifest: a list of entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        serde_yaml::from_str(yaml).map_err(HarnessError::from)
    }

    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Manifest(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }
}

/// The materialized example catalog.
pub struct Catalog;

impl Catalog {
    /// Load the manifest and list every entry's directory.
    ///
    /// In all-notebooks mode the CI-specific skip lists are ignored;
    /// everything else is identical between the two modes. Result order
    /// is directory listing order, not sorted.
    pub fn load(manifest_path: &Path, all_notebooks: bool) -> HarnessResult<Vec<Example>> {
        let manifest = Manifest::from_file(manifest_path)?;
        let root = manifest_path.parent().unwrap_or_else(|| Path::new("."));

        let mut examples = Vec::new();
        for entry in &manifest.entries {
            let dir = root.join(&entry.dir);
            Self::load_entry(&dir, entry, all_notebooks, &mut examples)?;
        }

        debug!("Catalog: {} examples from {} manifest entries", examples.len(), manifest.entries.len());
        Ok(examples)
    }

    fn load_entry(
        dir: &Path,
        entry: &ManifestEntry,
        all_notebooks: bool,
        examples: &mut Vec<Example>,
    ) -> HarnessResult<()> {
        let listing = std::fs::read_dir(dir).map_err(|e| {
            HarnessError::Manifest(format!("cannot list {}: {}", dir.display(), e))
        })?;

        for item in listing {
            let item = item?;
            let path = item.path();
            let name = item.file_name().to_string_lossy().to_string();

            if name.starts_with('_') || name.starts_with('.') {
                continue;
            }
            if !item.file_type()?.is_file() {
                continue;
            }

            let Some(kind) = Self::infer_kind(&path, &name, entry.kind) else {
                continue;
            };

            let animated = name.contains("animate");
            let skipped = entry.skip.iter().any(|s| s == &name)
                || (!all_notebooks && entry.skip_on_ci.iter().any(|s| s == &name));

            let flags = Flags::new(&name, kind, animated)?.with_skip(skipped);
            examples.push(Example { path, flags });
        }

        Ok(())
    }

    /// Decide the kind of a directory item, or None when it is not an
    /// example at all (wrong extension, subdirectory, ...).
    fn infer_kind(path: &Path, name: &str, forced: Option<Kind>) -> Option<Kind> {
        let ext = path.extension()?.to_string_lossy().to_string();

        if ext == NOTEBOOK_EXT {
            // Notebooks are notebooks even under a forced kind
            return Some(Kind::Notebook);
        }
        if ext != SCRIPT_EXT {
            return None;
        }
        if let Some(kind) = forced {
            return Some(kind);
        }
        if name.contains("server") || name.contains("animate") {
            Some(Kind::Server)
        } else {
            Some(Kind::File)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(root: &Path, yaml: &str) -> PathBuf {
        let path = root.join("gallery.yaml");
        fs::write(&path, yaml).unwrap();
        path
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn test_flags_reject_animated_file() {
        let err = Flags::new("animate_thing.py", Kind::File, true).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidFlags { .. }));

        assert!(Flags::new("animate_thing.py", Kind::Server, true).is_ok());
        assert!(Flags::new("animate.ipynb", Kind::Notebook, true).is_ok());
    }

    #[test]
    fn test_kind_inference() {
        let tmp = TempDir::new().unwrap();
        let plots = tmp.path().join("plots");
        fs::create_dir(&plots).unwrap();
        touch(&plots, "scatter.py");
        touch(&plots, "sliders_server.py");
        touch(&plots, "tour.ipynb");
        touch(&plots, "readme.txt");
        touch(&plots, "_helpers.py");
        touch(&plots, ".hidden.py");

        let manifest = write_manifest(tmp.path(), "- dir: plots\n");
        let catalog = Catalog::load(&manifest, false).unwrap();

        let mut kinds: Vec<(String, Kind)> = catalog
            .iter()
            .map(|e| (e.base_name(), e.flags.kind))
            .collect();
        kinds.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            kinds,
            vec![
                ("scatter".to_string(), Kind::File),
                ("sliders_server".to_string(), Kind::Server),
                ("tour".to_string(), Kind::Notebook),
            ]
        );
    }

    #[test]
    fn test_directories_are_not_examples() {
        let tmp = TempDir::new().unwrap();
        let plots = tmp.path().join("plots");
        fs::create_dir(&plots).unwrap();
        // A directory whose name looks like a script
        fs::create_dir(plots.join("old.py")).unwrap();
        touch(&plots, "scatter.py");

        let manifest = write_manifest(tmp.path(), "- dir: plots\n");
        let catalog = Catalog::load(&manifest, false).unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].base_name(), "scatter");
    }

    #[test]
    fn test_animate_forces_server_and_modifier() {
        let tmp = TempDir::new().unwrap();
        let plots = tmp.path().join("plots");
        fs::create_dir(&plots).unwrap();
        touch(&plots, "animate_wave.py");

        let manifest = write_manifest(tmp.path(), "- dir: plots\n");
        let catalog = Catalog::load(&manifest, false).unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].flags.kind, Kind::Server);
        assert!(catalog[0].flags.animated);
    }

    #[test]
    fn test_forced_file_kind_with_animate_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let plots = tmp.path().join("plots");
        fs::create_dir(&plots).unwrap();
        touch(&plots, "animate_wave.py");

        let manifest = write_manifest(tmp.path(), "- dir: plots\n  kind: file\n");
        let err = Catalog::load(&manifest, false).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidFlags { .. }));
    }

    #[test]
    fn test_invalid_kind_in_manifest_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let manifest = write_manifest(tmp.path(), "- dir: plots\n  kind: widget\n");
        let err = Catalog::load(&manifest, false).unwrap_err();
        assert!(matches!(err, HarnessError::Yaml(_)));
    }

    #[test]
    fn test_skip_list_union_modes() {
        let tmp = TempDir::new().unwrap();
        let nb = tmp.path().join("nb");
        fs::create_dir(&nb).unwrap();
        touch(&nb, "clean.ipynb");
        touch(&nb, "slow.ipynb");
        touch(&nb, "flaky.ipynb");

        let manifest = write_manifest(
            tmp.path(),
            "- dir: nb\n  skip:\n    - slow.ipynb\n  skip_on_ci:\n    - flaky.ipynb\n",
        );

        let skipped_of = |all_notebooks: bool| -> Vec<String> {
            let mut names: Vec<String> = Catalog::load(&manifest, all_notebooks)
                .unwrap()
                .iter()
                .filter(|e| e.flags.skip)
                .map(|e| e.base_name())
                .collect();
            names.sort();
            names
        };

        // Normal mode: union of both lists
        assert_eq!(skipped_of(false), vec!["flaky".to_string(), "slow".to_string()]);
        // All-notebooks mode: primary list only
        assert_eq!(skipped_of(true), vec!["slow".to_string()]);
    }
}
