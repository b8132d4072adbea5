//! Run configuration
//!
//! All options are parsed once in `main` into an immutable [`Config`]
//! that is passed by reference into every component. No component reads
//! ambient process state after startup; the only environment access at
//! run time is the variables injected into spawned subprocesses.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::notebook::OutputCellsPolicy;

/// Fixed seed injected into every example subprocess so that examples
/// using randomness produce reproducible output.
pub const RANDOM_SEED: u64 = 123456;

/// Environment variable carrying the seed.
pub const SEED_ENV: &str = "GALLERY_RANDOM_SEED";

/// Environment variable selecting how examples link their static resources.
pub const RESOURCES_ENV: &str = "GALLERY_RESOURCES";

/// Environment variable holding the artifact store bearer token.
pub const STORE_TOKEN_ENV: &str = "GALLERY_STORE_TOKEN";

#[derive(Parser, Debug)]
#[command(name = "gallery-harness")]
#[command(about = "End-to-end example runner for the plot gallery")]
pub struct Args {
    /// Only run examples whose path contains or glob-matches a pattern
    pub patterns: Vec<String>,

    /// Path to the gallery manifest
    #[arg(long, default_value = "gallery/gallery.yaml")]
    pub manifest: PathBuf,

    /// Port the render server listens on
    #[arg(long, default_value = "5006")]
    pub render_port: u16,

    /// Port the notebook kernel server listens on
    #[arg(long, default_value = "6007")]
    pub notebook_port: u16,

    /// Interpreter used to execute example scripts
    #[arg(long, default_value = "python")]
    pub interpreter: PathBuf,

    /// Path to the browser-automation screenshot script (run with node)
    #[arg(long, default_value = "scripts/screenshot.js")]
    pub renderer: PathBuf,

    /// Execute-phase deadline in seconds
    #[arg(short, long, default_value = "10")]
    pub timeout: u64,

    /// Echo browser console messages from the render phase
    #[arg(short, long)]
    pub verbose: bool,

    /// Use production resource linking instead of development builds
    #[arg(long)]
    pub no_dev: bool,

    /// Discover every notebook; CI-specific skip lists are ignored
    #[arg(long)]
    pub all_notebooks: bool,

    /// What to do with notebooks that have non-empty output cells
    #[arg(long, value_enum, default_value_t = OutputCellsPolicy::Complain)]
    pub output_cells: OutputCellsPolicy,

    /// Write a durable copy of all console output to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Compare generated screenshots against this reference version
    #[arg(long, value_name = "REF")]
    pub diff: Option<String>,

    /// Upload screenshots, diffs, and the report to the artifact store
    #[arg(long)]
    pub upload: bool,

    /// Version identifier for generated artifacts
    #[arg(long, env = "GALLERY_VERSION", default_value = "local")]
    pub version_id: String,

    /// Base URL of the artifact store
    #[arg(long, default_value = "https://s3.amazonaws.com/gallery-screenshots")]
    pub store_url: String,

    /// Directory for the JSON run summary
    #[arg(long, default_value = "harness-results")]
    pub results_dir: PathBuf,
}

/// Immutable run configuration, built once from [`Args`].
#[derive(Debug, Clone)]
pub struct Config {
    pub patterns: Vec<String>,
    pub manifest: PathBuf,
    pub render_port: u16,
    pub notebook_port: u16,
    pub interpreter: PathBuf,
    pub renderer: PathBuf,
    pub timeout: Duration,
    pub verbose: bool,
    pub no_dev: bool,
    pub all_notebooks: bool,
    pub output_cells: OutputCellsPolicy,
    pub log_file: Option<PathBuf>,
    pub diff_ref: Option<String>,
    pub upload: bool,
    pub version_id: String,
    pub store_url: String,
    pub results_dir: PathBuf,
    /// Bearer token for store writes, read once at startup.
    pub store_token: Option<String>,
}

impl Config {
    pub fn from_args(args: Args) -> Self {
        let store_token = std::env::var(STORE_TOKEN_ENV).ok().filter(|t| !t.is_empty());
        Self {
            patterns: args.patterns,
            manifest: args.manifest,
            render_port: args.render_port,
            notebook_port: args.notebook_port,
            interpreter: args.interpreter,
            renderer: args.renderer,
            timeout: Duration::from_secs(args.timeout),
            verbose: args.verbose,
            no_dev: args.no_dev,
            all_notebooks: args.all_notebooks,
            output_cells: args.output_cells,
            log_file: args.log_file,
            diff_ref: args.diff,
            upload: args.upload,
            version_id: args.version_id,
            store_url: args.store_url,
            results_dir: args.results_dir,
            store_token,
        }
    }

    /// Value for [`RESOURCES_ENV`] in example subprocesses.
    pub fn resources_mode(&self) -> &'static str {
        if self.no_dev {
            "relative"
        } else {
            "relative-dev"
        }
    }

    /// The gallery root is the directory containing the manifest;
    /// notebook URLs and store keys are built relative to it.
    pub fn gallery_root(&self) -> PathBuf {
        self.manifest
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(argv: &[&str]) -> Config {
        let mut full = vec!["gallery-harness"];
        full.extend_from_slice(argv);
        Config::from_args(Args::parse_from(full))
    }

    #[test]
    fn test_defaults() {
        let config = config_for(&[]);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.render_port, 5006);
        assert!(!config.upload);
        assert!(config.diff_ref.is_none());
    }

    #[test]
    fn test_resources_mode() {
        assert_eq!(config_for(&[]).resources_mode(), "relative-dev");
        assert_eq!(config_for(&["--no-dev"]).resources_mode(), "relative");
    }

    #[test]
    fn test_gallery_root_from_manifest() {
        let config = config_for(&["--manifest", "gallery/sub/gallery.yaml"]);
        assert_eq!(config.gallery_root(), PathBuf::from("gallery/sub"));
    }
}
