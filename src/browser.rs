mod browser_config;
mod session;
mod temp_dir;

pub use session::BrowserSession;

use anyhow::{Context, Result, anyhow};
use browser_config::BrowserConfig;
use log::{debug, warn};
use regex::Regex;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use temp_dir::CustomTempDir;

use crate::config::BrowserOptions;
use crate::tab::Tab;
use crate::transport::Transport;

/// How long the browser gets to print its debugging websocket URL.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct Process {
    child: Child,
    _temp_dir: CustomTempDir,
}

/// A browser process driven over CDP.
///
/// Dropping it kills the process and deletes its profile directory, so the process
/// never outlives its owner even when a run fails halfway.
#[derive(Debug)]
pub struct Browser {
    transport: Arc<Transport>,
    process: Mutex<Option<Process>>,
}

impl Browser {
    /// Launches a browser as described by `options`.
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let config = BrowserConfig::new(options)?;
        debug!(
            "Launching {} (headless: {})",
            config.executable_path.display(),
            config.headless
        );

        let mut child = spawn_process(&config)?;
        let stderr = child
            .stderr
            .take()
            .context("Failed to get stderr from browser process")?;

        // Own the child before awaiting anything so a failed handshake still kills it.
        let process = Process {
            child,
            _temp_dir: config.temp_dir,
        };

        let ws_url = match wait_for_ws(stderr).await {
            Ok(url) => url,
            Err(e) => {
                kill(process);
                return Err(e);
            }
        };
        let transport = match Transport::new(&ws_url).await {
            Ok(transport) => transport,
            Err(e) => {
                kill(process);
                return Err(e.context("Failed to connect to browser"));
            }
        };

        Ok(Self {
            transport: Arc::new(transport),
            process: Mutex::new(Some(process)),
        })
    }

    pub async fn new_tab(&self) -> Result<Tab> {
        Tab::new(self.transport.clone()).await
    }

    /// Asks the browser to exit, then kills the process and removes its profile.
    pub async fn close_async(&self) -> Result<()> {
        self.transport.shutdown().await;
        self.close()
    }

    /// Kills the browser process. Safe to call more than once.
    pub fn close(&self) -> Result<()> {
        let mut process_guard = self
            .process
            .lock()
            .map_err(|_| anyhow!("Failed to lock browser process"))?;

        if let Some(mut process) = process_guard.take() {
            process
                .child
                .kill()
                .context("Failed to kill browser process")?;
            process
                .child
                .wait()
                .context("Failed to wait for browser process exit")?;
        }

        Ok(())
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error closing browser in Drop: {:?}", e);
        }
    }
}

fn spawn_process(config: &BrowserConfig) -> Result<Child> {
    #[cfg(windows)]
    let mut cmd = {
        use std::os::windows::process::CommandExt;
        let mut c = Command::new(&config.executable_path);
        c.creation_flags(0x08000000); // CREATE_NO_WINDOW
        c
    };
    #[cfg(not(windows))]
    let mut cmd = Command::new(&config.executable_path);

    cmd.args(config.get_browser_args())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to start {}", config.executable_path.display()))
}

fn kill(mut process: Process) {
    let _ = process.child.kill();
    let _ = process.child.wait();
}

/// Reads browser stderr lines to extract the WebSocket debugging URL.
async fn wait_for_ws(stderr: std::process::ChildStderr) -> Result<String> {
    let reader = BufReader::new(stderr);
    let re = Regex::new(r"listening on (.*/devtools/browser/.*)$")?;
    let scan = tokio::task::spawn_blocking(move || {
        for line in reader.lines() {
            let l = line?;
            if let Some(cap) = re.captures(&l) {
                return Ok(cap[1].to_string());
            }
        }
        Err(anyhow!("WS URL not found in browser stderr"))
    });

    tokio::time::timeout(LAUNCH_TIMEOUT, scan)
        .await
        .map_err(|_| anyhow!("Timeout waiting for browser to start"))??
}
