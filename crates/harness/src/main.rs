//! gallery-harness - Main Entry Point
//!
//! Wires catalog discovery, selection, service startup, the run loop,
//! and publication together, and owns the exit-code contract. Backing
//! services are always terminated before exit, whether the loop
//! finished, hit a fatal error, or was interrupted.

use clap::Parser;
use std::fs::File;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gallery_harness::publish::{check_preconditions, publish};
use gallery_harness::report::{final_banner, interrupted_banner};
use gallery_harness::select::select;
use gallery_harness::store::ArtifactStore;
use gallery_harness::{Args, Catalog, Config, Runner, Services};

/// Duplicates console output into the durable log file.
#[derive(Clone)]
struct TeeWriter {
    file: Arc<Mutex<File>>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(buf);
        }
        io::stdout().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
        io::stdout().flush()
    }
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match &config.log_file {
        Some(path) => {
            let file = File::create(path)?;
            let tee = TeeWriter {
                file: Arc::new(Mutex::new(file)),
            };
            builder.with_writer(move || tee.clone()).init();
        }
        None => builder.init(),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args(Args::parse());
    init_logging(&config)?;

    let code = run(&config).await;
    std::process::exit(code);
}

enum LoopEnd {
    Done(gallery_harness::HarnessResult<()>),
    Interrupted,
}

async fn run(config: &Config) -> i32 {
    let catalog = match Catalog::load(&config.manifest, config.all_notebooks) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Catalog error: {}", e);
            return 1;
        }
    };

    let selected = select(&catalog, &config.patterns);
    if selected.is_empty() {
        warn!("No examples matched");
        return 0;
    }
    info!("Selected {} of {} example(s)", selected.len(), catalog.len());

    let store = ArtifactStore::new(&config.store_url, config.store_token.clone());
    if config.upload {
        if let Err(e) = check_preconditions(config, &store) {
            error!("{}", e);
            return 1;
        }
    }

    let services = match Services::start_for(config, &selected).await {
        Ok(services) => services,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let mut runner = Runner::new(config, services, store.clone());
    let started = Instant::now();

    let end = tokio::select! {
        result = runner.run(&selected) => LoopEnd::Done(result),
        _ = tokio::signal::ctrl_c() => LoopEnd::Interrupted,
    };

    // Services must never outlive the harness
    runner.shutdown();

    match end {
        LoopEnd::Interrupted => {
            warn!("{}", interrupted_banner(&runner.summary));
            1
        }
        LoopEnd::Done(Err(e)) => {
            error!("Fatal: {}", e);
            1
        }
        LoopEnd::Done(Ok(())) => {
            let duration_ms = started.elapsed().as_millis() as u64;
            if let Err(e) = runner.summary.to_report(duration_ms).write(&config.results_dir) {
                warn!("Could not write results file: {}", e);
            }

            if config.upload {
                if let Err(e) = publish(config, &store, &selected, &runner.summary).await {
                    error!("Publish failed: {}", e);
                    return 1;
                }
            }

            info!("{}", final_banner(&runner.summary));
            runner.summary.exit_code()
        }
    }
}
