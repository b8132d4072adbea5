//! Gallery example harness
//!
//! End-to-end runner for the plot gallery: discovers example scripts
//! and notebooks from a declarative manifest, executes them, loads the
//! rendered output in a browser-automation black box, captures
//! screenshots, compares them against reference images, and optionally
//! publishes artifacts to the screenshot store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      gallery-harness                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Catalog::load(manifest)      -> Vec<Example>                │
//! │  select(catalog, patterns)    -> Vec<Example>                │
//! │  Services::start_for(..)      -> render / notebook servers   │
//! │  Runner::run(selected)                                       │
//! │    ├── execute phase  (interpreter subprocess, deadline)     │
//! │    ├── render phase   (node screenshot script, JSON report)  │
//! │    └── reference diff (store fetch + pixel compare)          │
//! │  RunSummary             -> exit code, banners, JSON results  │
//! │  publish(..)            -> screenshots, diffs, HTML report   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod notebook;
pub mod publish;
pub mod renderer;
pub mod report;
pub mod runner;
pub mod select;
pub mod service;
pub mod store;
pub mod summary;
pub mod visual;

pub use catalog::{Catalog, Example, Flags, Kind};
pub use config::{Args, Config};
pub use error::{HarnessError, HarnessResult};
pub use runner::{Runner, Services};
pub use summary::{Outcome, RunSummary};
