//! Main run loop orchestrating execution, rendering, and comparison
//!
//! One control thread drives a strictly sequential loop over the
//! selected examples; each phase awaits a single subprocess at a time.
//! The only mutable shared state is the [`RunSummary`] owned here.

use std::path::PathBuf;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::catalog::{Example, Kind};
use crate::config::{Config, RANDOM_SEED, RESOURCES_ENV, SEED_ENV};
use crate::error::{HarnessError, HarnessResult};
use crate::notebook::{apply_output_policy, CellCheck};
use crate::renderer::Renderer;
use crate::report;
use crate::service::{ServiceConfig, ServiceHandle};
use crate::store::ArtifactStore;
use crate::summary::{Outcome, RunSummary};
use crate::visual;

/// The backing services a run may need, started on demand.
pub struct Services {
    pub render: Option<ServiceHandle>,
    pub notebook: Option<ServiceHandle>,
}

impl Services {
    /// Start whichever services the selected examples need. A needed
    /// service that never turns healthy aborts the whole run.
    pub async fn start_for(config: &Config, selected: &[Example]) -> HarnessResult<Self> {
        let render =
            ServiceHandle::ensure_started(ServiceConfig::render(config.render_port), selected)
                .await?;
        let notebook =
            ServiceHandle::ensure_started(ServiceConfig::notebook(config.notebook_port), selected)
                .await?;
        Ok(Self { render, notebook })
    }

    pub fn stop(&mut self) {
        if let Some(mut handle) = self.render.take() {
            handle.stop();
        }
        if let Some(mut handle) = self.notebook.take() {
            handle.stop();
        }
    }
}

/// Result of the execute phase for script-backed examples.
enum ExecResult {
    Completed,
    /// Deadline expired and the process was killed; not a failure
    TimedOut,
    Failed(String),
}

pub struct Runner<'a> {
    config: &'a Config,
    renderer: Renderer,
    services: Services,
    store: ArtifactStore,
    gallery_root: PathBuf,
    pub summary: RunSummary,
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a Config, services: Services, store: ArtifactStore) -> Self {
        Self {
            renderer: Renderer::new(config.renderer.clone(), config.timeout),
            services,
            store,
            gallery_root: config.gallery_root(),
            summary: RunSummary::new(0),
            config,
        }
    }

    /// Run every selected example in sort order, recording each outcome
    /// exactly once. Per-example failures are recorded and the loop
    /// continues; only fatal conditions propagate as errors.
    pub async fn run(&mut self, selected: &[Example]) -> HarnessResult<()> {
        let mut ordered: Vec<&Example> = selected.iter().collect();
        ordered.sort_by_key(|e| e.id());

        self.summary = RunSummary::new(ordered.len());

        for example in ordered {
            let id = example.id();
            info!("{}", report::banner(&id));

            let start = Instant::now();
            let outcome = match self.pre_skip(example) {
                Some(reason) => Outcome::Skipped(reason),
                None => self.run_example(example).await?,
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            let line = report::verdict_line(&id, &outcome, duration_ms);
            match &outcome {
                Outcome::Passed => info!("{}", line),
                Outcome::Failed(_) => error!("{}", line),
                Outcome::Skipped(_) => warn!("{}", line),
            }
            self.summary.record(&id, &outcome);
        }

        Ok(())
    }

    /// Stop backing services. Also runs from Drop, but calling it
    /// explicitly keeps shutdown ahead of the final banners.
    pub fn shutdown(&mut self) {
        self.services.stop();
    }

    /// Reasons an example never runs at all.
    fn pre_skip(&self, example: &Example) -> Option<String> {
        if example.flags.skip {
            return Some("on skip list".to_string());
        }
        match example.flags.kind {
            Kind::Server if self.services.render.is_none() => {
                Some("render service unavailable".to_string())
            }
            Kind::Notebook if self.services.notebook.is_none() => {
                Some("notebook service unavailable".to_string())
            }
            _ => None,
        }
    }

    async fn run_example(&mut self, example: &Example) -> HarnessResult<Outcome> {
        match example.flags.kind {
            Kind::File | Kind::Server => self.run_script(example).await,
            Kind::Notebook => self.run_notebook(example).await,
        }
    }

    async fn run_script(&mut self, example: &Example) -> HarnessResult<Outcome> {
        let timed_out = match self.execute_phase(example).await? {
            ExecResult::Completed => false,
            ExecResult::TimedOut => true,
            ExecResult::Failed(reason) => return Ok(Outcome::Failed(reason)),
        };

        let url = match example.flags.kind {
            Kind::File => {
                // The render phase needs the produced output to exist;
                // report absence as its own failure instead of letting
                // the renderer error opaquely.
                let html = example.html_output_path();
                if !html.exists() {
                    let reason = if timed_out {
                        "no output produced before the execute deadline".to_string()
                    } else {
                        "no output produced".to_string()
                    };
                    return Ok(Outcome::Failed(reason));
                }
                let html = html.canonicalize()?;
                format!("file://{}", html.display())
            }
            Kind::Server => {
                let handle = self
                    .services
                    .render
                    .as_ref()
                    .ok_or_else(|| HarnessError::ServiceStartup {
                        kind: "render".to_string(),
                        reason: "service handle missing".to_string(),
                    })?;
                format!("{}/{}", handle.base_url, example.base_name())
            }
            Kind::Notebook => unreachable!("notebooks are dispatched separately"),
        };

        self.render_and_verify(example, example.flags.kind, &url).await
    }

    async fn run_notebook(&mut self, example: &Example) -> HarnessResult<Outcome> {
        match apply_output_policy(&example.path, self.config.output_cells) {
            Ok(CellCheck::Clean) => {}
            Ok(CellCheck::Dirty(count)) => {
                return Ok(Outcome::Failed(format!(
                    "{} code cell(s) with stored output",
                    count
                )));
            }
            Ok(CellCheck::Removed(count)) => {
                warn!("{}: stripped output from {} cell(s)", example.id(), count);
            }
            Err(e) => return Ok(Outcome::Failed(format!("output cell check: {}", e))),
        }

        let handle = self
            .services
            .notebook
            .as_ref()
            .ok_or_else(|| HarnessError::ServiceStartup {
                kind: "notebook".to_string(),
                reason: "service handle missing".to_string(),
            })?;

        let rel = example.rel_path(&self.gallery_root);
        let segments: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        let url = format!("{}/notebooks/{}", handle.base_url, segments.join("/"));

        self.render_and_verify(example, Kind::Notebook, &url).await
    }

    /// Execute the example script in its own directory under the
    /// configured deadline. Expiry kills the process and is a soft
    /// timeout: long-running demos are allowed to run past it.
    async fn execute_phase(&self, example: &Example) -> HarnessResult<ExecResult> {
        let dir = example
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = example
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();

        debug!("Executing {} in {}", example.id(), dir.display());

        // The run future can be dropped by the ctrl-c race mid-execute;
        // the interpreter must not outlive the harness.
        let mut child = Command::new(&self.config.interpreter)
            .arg(&file_name)
            .current_dir(&dir)
            .env(SEED_ENV, RANDOM_SEED.to_string())
            .env(RESOURCES_ENV, self.config.resources_mode())
            .kill_on_drop(true)
            .spawn()?;

        match timeout(self.config.timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                if status.success() {
                    Ok(ExecResult::Completed)
                } else {
                    Ok(ExecResult::Failed(format!("execute phase {}", status)))
                }
            }
            Err(_) => {
                warn!(
                    "{}: still running after {:?}, killing (not a failure)",
                    example.id(),
                    self.config.timeout
                );
                let _ = child.kill().await;
                Ok(ExecResult::TimedOut)
            }
        }
    }

    /// Invoke the browser-automation black box and classify its report,
    /// then optionally compare against the reference version.
    async fn render_and_verify(
        &self,
        example: &Example,
        kind: Kind,
        url: &str,
    ) -> HarnessResult<Outcome> {
        let screenshot = example.screenshot_path(&self.config.version_id);

        let report = match self.renderer.render(kind, url, &screenshot).await {
            Ok(report) => report,
            Err(e @ HarnessError::RendererNotFound(_)) => return Err(e),
            Err(HarnessError::Renderer(msg)) => {
                return Ok(Outcome::Failed(format!("renderer: {}", msg)));
            }
            Err(e) => return Err(e),
        };

        if self.config.verbose {
            for message in &report.messages {
                info!("{}: console: {}", example.id(), message.msg);
            }
        }

        let verdict = report.verdict();
        for warning in &verdict.warnings {
            warn!("{}: {}", example.id(), warning);
        }
        if !verdict.passed() {
            return Ok(Outcome::Failed(verdict.failures.join("; ")));
        }

        if let Some(reference) = &self.config.diff_ref {
            self.reference_diff(example, reference, &screenshot).await;
        }

        Ok(Outcome::Passed)
    }

    /// Compare the generated screenshot against the reference version.
    /// A missing reference is informational; a mismatch is a warning
    /// flagged for human review, never a failure.
    async fn reference_diff(&self, example: &Example, reference: &str, screenshot: &std::path::Path) {
        let rel = example.rel_path(&self.gallery_root);
        let key = format!("{}/{}.png", reference, rel.to_string_lossy());

        let bytes = match self.store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("{}: no reference image at {}", example.id(), key);
                return;
            }
            Err(e) => {
                warn!("{}: reference fetch failed: {}", example.id(), e);
                return;
            }
        };

        let result = (|| -> HarnessResult<()> {
            let download = tempfile::tempdir()?;
            let reference_path = download.path().join("reference.png");
            std::fs::write(&reference_path, &bytes)?;

            let diff_out = example.diff_path(&self.config.version_id);
            let diff = visual::compare(screenshot, &reference_path, &diff_out)?;
            if diff.differs {
                warn!(
                    "{}: differs from reference {} ({:.2}% of pixels)",
                    example.id(),
                    reference,
                    diff.diff_percent
                );
            }
            Ok(())
        })();

        if let Err(e) = result {
            warn!("{}: visual comparison failed: {}", example.id(), e);
        }
    }
}

impl Drop for Runner<'_> {
    fn drop(&mut self) {
        self.services.stop();
    }
}
