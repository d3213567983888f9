//! Error types for the functional test harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("invalid appconfig: {0}")]
    Config(String),

    #[error("no recognized database specified: {0}")]
    UnrecognizedBackend(String),

    #[error("testing is not enabled: set `{flag}` in {path}")]
    TestingDisabled { flag: String, path: String },

    #[error("server failed to start: {0}")]
    ServerStartup(String),

    #[error("chromedriver not found. Install a chromedriver matching the local Chrome and put it on PATH")]
    ChromedriverNotFound,

    #[error("browser session failed to start: {0}")]
    BrowserStartup(String),

    #[error("no HTTP response from {url} after {attempts} attempts")]
    Unresponsive { url: String, attempts: usize },

    #[error("fixture data: {0}")]
    Fixture(String),

    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    #[error("webdriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("mysql error: {0}")]
    Mysql(#[from] mysql::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
