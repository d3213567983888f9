//! Shared fixture lifecycle for the functional suites
//!
//! Each suite gets exactly one `Harness`: one database connection, one
//! application server process, one browser session. Set up before the
//! suite's first test and torn down after its last.

use thirtyfour::By;

use crate::browser::BrowserSession;
use crate::config::{db_uri_from_appconfig, ensure_testing_enabled, HarnessConfig};
use crate::db::{Database, UnreservedSpecies};
use crate::error::HarnessResult;
use crate::server::ServerHandle;

pub struct Harness {
    config: HarnessConfig,
    db: Database,
    server: ServerHandle,
    browser: BrowserSession,
}

impl Harness {
    /// Bring up the full fixture. Any failure here is fatal to the run;
    /// there is no point running page tests against a half-started stack.
    pub async fn setup(config: HarnessConfig) -> HarnessResult<Self> {
        ensure_testing_enabled(&config.testing_flag, &config.settings_path())?;

        let uri = db_uri_from_appconfig(&config.appconfig_path())?;
        let db = Database::connect(&uri, &config.app_dir)?;

        let server = ServerHandle::spawn(&config.server_config()).await?;
        let browser = BrowserSession::launch(&config.browser_config()).await?;

        Ok(Self {
            config,
            db,
            server,
            browser,
        })
    }

    /// Quit the browser, then terminate the server.
    pub async fn teardown(self) -> HarnessResult<()> {
        let Harness {
            browser,
            mut server,
            ..
        } = self;
        browser.quit().await?;
        server.stop()?;
        Ok(())
    }

    /// Root URL the server answers on, with trailing slash
    pub fn base_url(&self) -> &str {
        self.server.base_url()
    }

    /// Load an application page given relative to the base URL,
    /// e.g. `life?embed=3`.
    pub async fn navigate(&self, page: &str) -> HarnessResult<()> {
        let url = format!("{}{}", self.base_url(), page);
        self.browser.navigate(&url).await
    }

    pub async fn element_exists(&self, by: By) -> HarnessResult<bool> {
        self.browser.element_exists(by).await
    }

    pub async fn has_linkouts(&self, include_internal: bool) -> HarnessResult<bool> {
        self.browser.has_linkouts(include_internal).await
    }

    pub async fn view_name_contains(&self, expected: &str) -> HarnessResult<bool> {
        self.browser.view_name_contains(expected).await
    }

    /// See [`Database::never_looked_at_species`].
    pub fn get_never_looked_at_species(&mut self) -> HarnessResult<UnreservedSpecies> {
        let base_url = self.base_url().to_string();
        self.db.never_looked_at_species(&base_url)
    }

    /// Remove a reservation row a test created. `email` defaults to the
    /// configured test address; pass it only when a test reserved under a
    /// different one. Returns the deleted-row count so callers can assert
    /// exactly one row went away.
    pub fn delete_reservation_entry(
        &mut self,
        ott: i64,
        name: &str,
        email: Option<&str>,
    ) -> HarnessResult<usize> {
        let email = email.unwrap_or(&self.config.test_email);
        self.db.delete_reservation(ott, name, email)
    }
}
