//! Artifact publisher - screenshot/diff uploads and the HTML report

use std::path::Path;
use tracing::{debug, info};

use crate::catalog::Example;
use crate::config::Config;
use crate::error::{HarnessError, HarnessResult};
use crate::report::{render_html, ReportEntry};
use crate::store::ArtifactStore;
use crate::summary::RunSummary;

/// Checked before any example runs: uploading requires credentials and
/// a clean working tree, otherwise the run aborts up front.
pub fn check_preconditions(config: &Config, store: &ArtifactStore) -> HarnessResult<()> {
    if !store.can_upload() {
        return Err(HarnessError::MissingCredentials);
    }
    if config.version_id.contains("dirty") {
        return Err(HarnessError::DirtyVersion(config.version_id.clone()));
    }
    Ok(())
}

/// Upload every locally present screenshot and diff, then the rendered
/// report and the run log. Examples are published in sorted order.
pub async fn publish(
    config: &Config,
    store: &ArtifactStore,
    selected: &[Example],
    summary: &RunSummary,
) -> HarnessResult<()> {
    let version = &config.version_id;
    let gallery_root = config.gallery_root();

    let mut ordered: Vec<&Example> = selected.iter().collect();
    ordered.sort_by_key(|e| e.id());

    let mut entries = Vec::with_capacity(ordered.len());
    for example in ordered {
        entries.push(publish_example(config, store, example, summary, &gallery_root).await?);
    }

    let report_key = format!("{}/report.html", version);
    store
        .put(&report_key, render_html(&entries, version).into_bytes(), "text/html")
        .await?;
    info!("Report uploaded: {}", store.public_url(&report_key));

    if let Some(log_file) = &config.log_file {
        if log_file.exists() {
            let log_key = format!("{}/examples.log", version);
            store.put_file(&log_key, log_file).await?;
            info!("Log uploaded: {}", store.public_url(&log_key));
        }
    }

    Ok(())
}

async fn publish_example(
    config: &Config,
    store: &ArtifactStore,
    example: &Example,
    summary: &RunSummary,
    gallery_root: &Path,
) -> HarnessResult<ReportEntry> {
    let version = &config.version_id;
    let rel = example.rel_path(gallery_root).to_string_lossy().to_string();
    let png_key = format!("{}/{}.png", version, rel);
    let diff_key = format!("{}/{}-diff.png", version, rel);

    let screenshot = example.screenshot_path(version);
    if screenshot.exists() {
        store.put_file(&png_key, &screenshot).await?;
        debug!("Uploaded {}", png_key);
    }

    let diff = example.diff_path(version);
    let diff_url = if diff.exists() {
        store.put_file(&diff_key, &diff).await?;
        debug!("Uploaded {}", diff_key);
        Some(store.public_url(&diff_key))
    } else {
        None
    };

    let id = example.id();
    Ok(ReportEntry {
        rel_path: rel.clone(),
        reference: config.diff_ref.clone(),
        failed: summary.failed(&id),
        skipped: summary.skipped(&id),
        generated_url: store.public_url(&png_key),
        diff_url,
        reference_url: config
            .diff_ref
            .as_ref()
            .map(|r| store.public_url(&format!("{}/{}.png", r, rel))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use clap::Parser;

    fn config_for(argv: &[&str]) -> Config {
        let mut full = vec!["gallery-harness"];
        full.extend_from_slice(argv);
        Config::from_args(Args::parse_from(full))
    }

    #[test]
    fn test_dirty_version_is_fatal() {
        let config = config_for(&["--upload", "--version-id", "2.0.0-4-gabc123-dirty"]);
        let store = ArtifactStore::new(&config.store_url, Some("token".to_string()));
        let err = check_preconditions(&config, &store).unwrap_err();
        assert!(matches!(err, HarnessError::DirtyVersion(_)));
    }

    #[test]
    fn test_missing_credentials_is_fatal() {
        let config = config_for(&["--upload", "--version-id", "2.0.0"]);
        let store = ArtifactStore::new(&config.store_url, None);
        let err = check_preconditions(&config, &store).unwrap_err();
        assert!(matches!(err, HarnessError::MissingCredentials));
    }

    #[test]
    fn test_clean_version_passes() {
        let config = config_for(&["--upload", "--version-id", "2.0.0"]);
        let store = ArtifactStore::new(&config.store_url, Some("token".to_string()));
        assert!(check_preconditions(&config, &store).is_ok());
    }
}
