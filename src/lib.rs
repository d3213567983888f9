//! Functional test harness for the treeviewer web application
//!
//! Drives the real stack end to end:
//! - spawns the application server as a subprocess
//! - opens a WebDriver browser session with console-log capture
//! - inspects served pages: DOM state, outbound links, view names
//! - reads and minimally mutates the application database for fixtures
//!
//! Concrete page suites live under `tests/functional/` and run through
//! the `functional` test binary, which owns suite selection and
//! reporting. Everything is sequential: one server, one browser, one
//! database connection per suite, set up once and torn down once.

pub mod browser;
pub mod config;
pub mod db;
pub mod error;
pub mod harness;
pub mod runner;
pub mod server;

pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use harness::Harness;

pub use thirtyfour::By;
