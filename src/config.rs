//! Harness configuration and appconfig resolution
//!
//! One `HarnessConfig` is built at process start and handed to the
//! components that need it. The application's own `appconfig.ini` is only
//! consulted for the database URI; everything else is harness-side.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

use crate::browser::BrowserConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::server::ServerConfig;

/// Harness-wide settings, shared by every suite in a run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Address the application server binds
    pub host: String,

    /// Port the application server binds
    pub port: u16,

    /// Root of the application checkout under test
    pub app_dir: PathBuf,

    /// Interpreter the application's launcher script runs under
    pub interpreter: String,

    /// The launcher script itself
    pub launcher: PathBuf,

    /// Alternate appconfig forwarded to the launcher, if any
    pub appconfig_override: Option<PathBuf>,

    /// chromedriver binary used to drive the browser
    pub chromedriver: PathBuf,

    /// Run the browser headless
    pub headless: bool,

    /// Line that must be present in the application's settings module
    /// before any test is allowed to touch it
    pub testing_flag: String,

    /// Email reservations made by tests are filed under
    pub test_email: String,
}

impl HarnessConfig {
    pub fn new(app_dir: PathBuf) -> Self {
        // the launcher ships two levels above the application directory
        let launcher = app_dir.join("..").join("..").join("web2py.py");
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
            interpreter: "python3".to_string(),
            launcher,
            appconfig_override: None,
            chromedriver: PathBuf::from("chromedriver"),
            headless: true,
            testing_flag: "is_testing=True".to_string(),
            test_email: "test@treeviewer.org".to_string(),
            app_dir,
        }
    }

    /// Root URL the server will answer on, with trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }

    /// The appconfig the database URI is read from. The override only
    /// affects what the server launcher is handed, not this path.
    pub fn appconfig_path(&self) -> PathBuf {
        self.app_dir.join("private").join("appconfig.ini")
    }

    /// Settings module that must carry the testing flag
    pub fn settings_path(&self) -> PathBuf {
        self.app_dir.join("models").join("db.py")
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            interpreter: self.interpreter.clone(),
            launcher: self.launcher.clone(),
            host: self.host.clone(),
            port: self.port,
            appconfig: self.appconfig_override.clone(),
            startup_timeout: Duration::from_secs(30),
        }
    }

    pub fn browser_config(&self) -> BrowserConfig {
        BrowserConfig {
            chromedriver: self.chromedriver.clone(),
            headless: self.headless,
            implicit_wait: Duration::from_secs(1),
            startup_timeout: Duration::from_secs(15),
        }
    }
}

/// Pull the `uri` value out of the `[db]` section of an appconfig file.
///
/// The file is INI-like: `[section]` headers and `key = value` lines. A
/// missing file, section, or key is a fatal configuration error.
pub fn db_uri_from_appconfig(path: &Path) -> HarnessResult<String> {
    let section_re = Regex::new(r"^\[([^\]]+)\]").expect("section header pattern");
    let uri_re = Regex::new(r"^uri\s*=\s*(\S+)").expect("uri key pattern");

    let text = std::fs::read_to_string(path)
        .map_err(|e| HarnessError::Config(format!("cannot read {}: {}", path.display(), e)))?;

    let mut section = String::new();
    let mut uri = None;
    for line in text.lines() {
        if let Some(caps) = section_re.captures(line) {
            section = caps[1].to_string();
        }
        if section == "db" {
            if let Some(caps) = uri_re.captures(line) {
                uri = Some(caps[1].to_string());
            }
        }
    }

    uri.ok_or_else(|| {
        HarnessError::Config(format!(
            "can't find a database uri under [db] in {}",
            path.display()
        ))
    })
}

/// Whether a source file carries `flag` as the start of some line,
/// compared with all spaces stripped so formatting does not matter.
pub fn flag_set_in_source(flag: &str, path: &Path) -> HarnessResult<bool> {
    let want = flag.trim().replace(' ', "");
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .any(|line| line.trim().replace(' ', "").starts_with(&want)))
}

/// Abort the run unless the application's settings module enables testing.
pub fn ensure_testing_enabled(flag: &str, path: &Path) -> HarnessResult<()> {
    if flag_set_in_source(flag, path)? {
        Ok(())
    } else {
        Err(HarnessError::TestingDisabled {
            flag: flag.to_string(),
            path: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_uri_found_under_db_section() {
        let file = write_file("[general]\nname = tree\n[db]\nuri = sqlite://storage.sqlite\npool = 1\n");
        let uri = db_uri_from_appconfig(file.path()).unwrap();
        assert_eq!(uri, "sqlite://storage.sqlite");
    }

    #[test]
    fn test_uri_in_other_section_is_ignored() {
        let file = write_file("[smtp]\nuri = smtp://localhost\n[db]\npool = 1\n");
        let err = db_uri_from_appconfig(file.path()).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn test_missing_db_section_is_an_error() {
        let file = write_file("[general]\nname = tree\n");
        assert!(db_uri_from_appconfig(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = db_uri_from_appconfig(Path::new("/nonexistent/appconfig.ini")).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn test_flag_matches_through_whitespace() {
        let file = write_file("db = DAL(uri)\nis_testing = True\n");
        assert!(flag_set_in_source("is_testing=True", file.path()).unwrap());
    }

    #[test]
    fn test_flag_absent() {
        let file = write_file("is_testing = False\n");
        assert!(!flag_set_in_source("is_testing=True", file.path()).unwrap());
    }

    #[test]
    fn test_ensure_testing_enabled_reports_remedy() {
        let file = write_file("nothing here\n");
        let err = ensure_testing_enabled("is_testing=True", file.path()).unwrap_err();
        assert!(err.to_string().contains("is_testing=True"));
    }

    #[test]
    fn test_base_url_has_trailing_slash() {
        let config = HarnessConfig::new(PathBuf::from("/srv/app"));
        assert_eq!(config.base_url(), "http://127.0.0.1:8001/");
    }
}
