//! Backing service lifecycle - spawning and health checking the render
//! and notebook kernel servers
//!
//! Services are started only when a selected example needs them, and
//! are terminated unconditionally when the handle drops, so no server
//! outlives the harness even on an interrupted run.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::catalog::{Example, Kind};
use crate::error::{HarnessError, HarnessResult};

/// Poll interval for service health checks.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Total budget for a service to become healthy.
pub const HEALTH_POLL_BUDGET: Duration = Duration::from_secs(5);

/// Which backing service a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Render,
    Notebook,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Render => "render",
            ServiceKind::Notebook => "notebook",
        }
    }

    /// The example kind that requires this service.
    fn required_by(&self) -> Kind {
        match self {
            ServiceKind::Render => Kind::Server,
            ServiceKind::Notebook => Kind::Notebook,
        }
    }
}

/// Configuration for spawning one backing service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub kind: ServiceKind,

    /// Binary to spawn
    pub command: PathBuf,

    /// Fixed startup arguments (port substituted in by the caller)
    pub args: Vec<String>,

    /// Port the service listens on
    pub port: u16,

    /// Health-check path under the base URL
    pub health_path: String,

    /// Whether this environment can run the service at all; disabled
    /// services cause dependent examples to be skipped, not started
    pub enabled: bool,

    /// Health poll cadence
    pub poll_interval: Duration,

    /// Total budget for the service to become healthy
    pub poll_budget: Duration,
}

impl ServiceConfig {
    pub fn render(port: u16) -> Self {
        Self {
            kind: ServiceKind::Render,
            command: PathBuf::from("gallery-server"),
            args: vec!["serve".to_string(), "--port".to_string(), port.to_string()],
            port,
            health_path: "/".to_string(),
            enabled: true,
            poll_interval: HEALTH_POLL_INTERVAL,
            poll_budget: HEALTH_POLL_BUDGET,
        }
    }

    pub fn notebook(port: u16) -> Self {
        Self {
            kind: ServiceKind::Notebook,
            command: PathBuf::from("jupyter"),
            args: vec![
                "notebook".to_string(),
                "--no-browser".to_string(),
                format!("--port={}", port),
            ],
            port,
            health_path: "/api".to_string(),
            enabled: true,
            poll_interval: HEALTH_POLL_INTERVAL,
            poll_budget: HEALTH_POLL_BUDGET,
        }
    }
}

/// Handle to a running backing service process.
#[derive(Debug)]
pub struct ServiceHandle {
    child: Child,
    pub kind: ServiceKind,
    pub base_url: String,
    pub port: u16,
}

impl ServiceHandle {
    /// Start the service if any selected example needs it.
    ///
    /// Returns `None` without spawning when nothing selected requires
    /// the service or when it is disabled in this environment. A spawn
    /// that never turns healthy is fatal: no dependent example could
    /// possibly succeed.
    pub async fn ensure_started(
        config: ServiceConfig,
        selected: &[Example],
    ) -> HarnessResult<Option<Self>> {
        let needed = selected
            .iter()
            .any(|e| e.flags.kind == config.kind.required_by());

        if !needed {
            return Ok(None);
        }
        if !config.enabled {
            warn!("{} service disabled; dependent examples will be skipped", config.kind.as_str());
            return Ok(None);
        }

        Ok(Some(Self::spawn(config).await?))
    }

    /// Spawn the service process and wait for it to pass health checks.
    pub async fn spawn(config: ServiceConfig) -> HarnessResult<Self> {
        let base_url = format!("http://127.0.0.1:{}", config.port);

        info!("Starting {} service on port {}", config.kind.as_str(), config.port);

        let child = Command::new(&config.command)
            .args(&config.args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| HarnessError::ServiceStartup {
                kind: config.kind.as_str().to_string(),
                reason: format!("failed to spawn {}: {}", config.command.display(), e),
            })?;

        let handle = ServiceHandle {
            child,
            kind: config.kind,
            base_url: base_url.clone(),
            port: config.port,
        };

        let health_url = format!("{}{}", base_url, config.health_path);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        wait_until(config.poll_interval, config.poll_budget, || {
            let client = client.clone();
            let url = health_url.clone();
            async move {
                matches!(client.get(&url).send().await, Ok(resp) if resp.status().is_success())
            }
        })
        .await
        .map_err(|attempts| HarnessError::ServiceHealthCheck {
            kind: config.kind.as_str().to_string(),
            attempts,
        })?;

        info!("{} service is healthy at {}", config.kind.as_str(), base_url);
        Ok(handle)
    }

    /// Stop the service. Graceful shutdown is not required beyond
    /// process termination.
    pub fn stop(&mut self) {
        info!("Stopping {} service (pid: {})", self.kind.as_str(), self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(200));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Poll `probe` every `interval` until it returns true or `budget` is
/// spent. Returns the number of attempts made on failure.
pub async fn wait_until<F, Fut>(
    interval: Duration,
    budget: Duration,
    mut probe: F,
) -> Result<(), usize>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    let mut attempts = 0;

    while start.elapsed() < budget {
        attempts += 1;
        if probe().await {
            return Ok(());
        }
        sleep(interval).await;
    }

    Err(attempts)
}
