//! Server management - spawning and terminating the application server

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{HarnessError, HarnessResult};

/// Handle to a running application server process
pub struct ServerHandle {
    child: Child,
    pub base_url: String,
}

impl ServerHandle {
    /// Spawn the application server bound to the configured address.
    ///
    /// A squatter already holding the port is not detected here; it shows
    /// up later as navigation failures in the tests themselves.
    pub async fn spawn(config: &ServerConfig) -> HarnessResult<Self> {
        let base_url = format!("http://{}:{}/", config.host, config.port);

        info!("Spawning application server on {}", base_url);

        let mut cmd = Command::new(&config.interpreter);
        cmd.args(launch_args(config));
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| {
            HarnessError::ServerStartup(format!(
                "failed to spawn {} {}: {}",
                config.interpreter,
                config.launcher.display(),
                e
            ))
        })?;

        let handle = ServerHandle {
            child,
            base_url: base_url.clone(),
        };

        wait_until_responsive(&base_url, config.startup_timeout).await?;

        info!("Server is answering at {}", base_url);
        Ok(handle)
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the server. SIGTERM first, then a hard kill; the application
    /// has no shutdown handshake to wait on.
    pub fn stop(&mut self) -> HarnessResult<()> {
        info!("Stopping server (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning the application server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interpreter the launcher script runs under
    pub interpreter: String,

    /// Path to the application's launcher script
    pub launcher: PathBuf,

    /// Address to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Extra application config file, forwarded to the launcher
    pub appconfig: Option<PathBuf>,

    /// Timeout for server startup
    pub startup_timeout: Duration,
}

/// Argument list handed to the interpreter: the launcher in quiet mode,
/// the bind address and port, a throwaway admin password, and optionally
/// an alternate appconfig.
fn launch_args(config: &ServerConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        config.launcher.clone().into(),
        "-Q".into(),
        "-i".into(),
        config.host.clone().into(),
        "-p".into(),
        config.port.to_string().into(),
        "-a".into(),
        "pass".into(),
    ];
    if let Some(appconfig) = &config.appconfig {
        args.push("--args".into());
        args.push(appconfig.clone().into());
    }
    args
}

/// Poll `url` until it answers HTTP at all. Any response counts as up,
/// since the application may legitimately serve error pages.
pub(crate) async fn wait_until_responsive(url: &str, timeout: Duration) -> HarnessResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = std::time::Instant::now();
    let mut attempts = 0;

    while start.elapsed() < timeout {
        attempts += 1;

        match client.get(url).send().await {
            Ok(_) => return Ok(()),
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} ...", url);
                }
                // connection refused is expected while the process starts
                if !e.is_connect() {
                    warn!("Readiness probe error: {}", e);
                }
            }
        }

        sleep(Duration::from_millis(100)).await;
    }

    Err(HarnessError::Unresponsive {
        url: url.to_string(),
        attempts,
    })
}

/// Find a free port to use
pub(crate) fn find_free_port() -> u16 {
    use std::net::TcpListener;

    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to find free port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}
