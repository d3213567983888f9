//! Browser session management over the WebDriver protocol
//!
//! One chromedriver process and one WebDriver session per suite. Console
//! logging is captured at full verbosity, and a short implicit wait is
//! applied to every element lookup so freshly-loaded pages settle before a
//! lookup is declared a miss.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde_json::json;
use thirtyfour::error::WebDriverError;
use thirtyfour::{By, CapabilitiesHelper, ChromeCapabilities, DesiredCapabilities, WebDriver};
use tracing::{debug, info};

use crate::error::{HarnessError, HarnessResult};
use crate::server::{find_free_port, wait_until_responsive};

/// Configuration for the browser session
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// chromedriver binary to spawn
    pub chromedriver: PathBuf,

    /// Run the browser headless
    pub headless: bool,

    /// Applied to all element lookups
    pub implicit_wait: Duration,

    /// Timeout for chromedriver startup
    pub startup_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chromedriver: PathBuf::from("chromedriver"),
            headless: true,
            implicit_wait: Duration::from_secs(1),
            startup_timeout: Duration::from_secs(15),
        }
    }
}

/// Handle to a chromedriver process and the WebDriver session it serves
pub struct BrowserSession {
    driver: WebDriver,
    chromedriver: Child,
}

impl BrowserSession {
    /// Spawn chromedriver on a free port and open a session against it.
    pub async fn launch(config: &BrowserConfig) -> HarnessResult<Self> {
        let port = find_free_port();
        let driver_url = format!("http://127.0.0.1:{}", port);

        info!("Launching chromedriver on port {}", port);

        let chromedriver = Command::new(&config.chromedriver)
            .arg(format!("--port={}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => HarnessError::ChromedriverNotFound,
                _ => HarnessError::BrowserStartup(format!(
                    "failed to spawn {}: {}",
                    config.chromedriver.display(),
                    e
                )),
            })?;

        match Self::open_session(config, &driver_url).await {
            Ok(driver) => Ok(Self {
                driver,
                chromedriver,
            }),
            Err(e) => {
                let mut child = chromedriver;
                let _ = child.kill();
                let _ = child.wait();
                Err(e)
            }
        }
    }

    async fn open_session(config: &BrowserConfig, driver_url: &str) -> HarnessResult<WebDriver> {
        wait_until_responsive(&format!("{}/status", driver_url), config.startup_timeout).await?;

        let caps = chrome_capabilities(config.headless)?;
        let driver = WebDriver::new(driver_url, caps).await?;
        driver.set_implicit_wait_timeout(config.implicit_wait).await?;

        Ok(driver)
    }

    /// Load a page, blocking until its load event fires.
    pub async fn navigate(&self, url: &str) -> HarnessResult<()> {
        debug!("Navigating to {}", url);
        self.driver.goto(url).await?;
        Ok(())
    }

    /// Whether an element matching the locator is present. A missing
    /// element is an expected outcome here, not an error.
    pub async fn element_exists(&self, by: By) -> HarnessResult<bool> {
        match self.driver.find(by).await {
            Ok(_) => Ok(true),
            Err(WebDriverError::NoSuchElement(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// True if anything on the page links out of the application.
    ///
    /// Inspects every tag carrying an href, e.g. `<a>`, `<map>`, but also
    /// `<link href="styles.css">`, which never counts. With
    /// `include_internal` even relative links such as
    /// `<a href='/sponsored'>` count.
    pub async fn has_linkouts(&self, include_internal: bool) -> HarnessResult<bool> {
        for element in self.driver.find_all(By::Css("[href]")).await? {
            let tag = element.tag_name().await?;
            let raw = element.attr("href").await?.unwrap_or_default();
            let resolved = element.prop("href").await?.unwrap_or_default();
            if is_linkout(&tag, &raw, &resolved, include_internal) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The application injects the name of the server-side view that
    /// rendered the page into `<meta name="viewfile" content="...">`;
    /// check that content for a substring. An absent tag is `false`.
    pub async fn view_name_contains(&self, expected: &str) -> HarnessResult<bool> {
        match self.driver.find(By::XPath("//meta[@name='viewfile']")).await {
            Ok(meta) => {
                let content = meta.attr("content").await?.unwrap_or_default();
                Ok(content.contains(expected))
            }
            Err(WebDriverError::NoSuchElement(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Close the WebDriver session and take chromedriver down with it.
    pub async fn quit(mut self) -> HarnessResult<()> {
        self.driver.clone().quit().await?;
        let _ = self.chromedriver.kill();
        let _ = self.chromedriver.wait();
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let _ = self.chromedriver.kill();
        let _ = self.chromedriver.wait();
    }
}

/// Chrome capabilities with console-log capture at full verbosity
fn chrome_capabilities(headless: bool) -> HarnessResult<ChromeCapabilities> {
    let mut caps = DesiredCapabilities::chrome();
    if headless {
        caps.add_chrome_arg("--headless=new")?;
    }
    caps.add("goog:loggingPrefs", json!({ "browser": "ALL" }))?;
    Ok(caps)
}

/// Classify one href-bearing element.
///
/// `raw` is the attribute as written in the page; `resolved` is the
/// browser-expanded value, where relative links come back as absolute http
/// URLs while mailto:, ftp:, file: and friends keep their scheme.
fn is_linkout(tag: &str, raw: &str, resolved: &str, include_internal: bool) -> bool {
    if tag.eq_ignore_ascii_case("link") {
        // stylesheet includes, e.g. <link href="styles.css">
        return false;
    }
    if raw.starts_with("http") || raw.starts_with("//") {
        return true;
    }
    if include_internal {
        return true;
    }
    !resolved.starts_with("http")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("link", "styles.css", "http://127.0.0.1:8001/styles.css", false => false; "stylesheet link is allowed")]
    #[test_case("link", "http://cdn.example.com/styles.css", "http://cdn.example.com/styles.css", false => false; "even an absolute stylesheet link is allowed")]
    #[test_case("a", "http://example.com", "http://example.com/", false => true; "absolute href is a linkout")]
    #[test_case("a", "//example.com/page", "http://example.com/page", false => true; "protocol-relative href is a linkout")]
    #[test_case("a", "mailto:x@y.com", "mailto:x@y.com", false => true; "mailto does not resolve to http")]
    #[test_case("area", "ftp://files.example.com", "ftp://files.example.com", false => true; "ftp raw href")]
    #[test_case("a", "/sponsored", "http://127.0.0.1:8001/sponsored", false => false; "relative link stays internal")]
    #[test_case("a", "/sponsored", "http://127.0.0.1:8001/sponsored", true => true; "relative link counts when internal links are banned")]
    fn test_linkout_classification(
        tag: &str,
        raw: &str,
        resolved: &str,
        include_internal: bool,
    ) -> bool {
        is_linkout(tag, raw, resolved, include_internal)
    }

    #[test]
    fn test_chrome_caps_capture_console_logs() {
        let caps = chrome_capabilities(false).unwrap();
        assert_eq!(
            caps.get("goog:loggingPrefs"),
            Some(&json!({ "browser": "ALL" }))
        );
    }

    #[test]
    fn test_headless_is_a_chrome_arg() {
        let caps = chrome_capabilities(true).unwrap();
        let opts = caps.get("goog:chromeOptions").expect("chrome options");
        let args = opts["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));
    }
}
