use anyhow::{Context, Result, anyhow};
use rand::prelude::SliceRandom;
use std::net;
use std::path::{Path, PathBuf};
use which::which;

#[cfg(windows)]
use winreg::{RegKey, enums::HKEY_LOCAL_MACHINE};

use crate::browser::temp_dir::CustomTempDir;
use crate::config::BrowserOptions;

static DEFAULT_ARGS: [&str; 18] = [
    // Process and memory
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--no-zygote",
    "--disable-dev-shm-usage",
    "--disable-background-networking",
    "--disable-component-update",
    "--disable-domain-reliability",
    "--disable-features=Translate,OptimizationHints,MediaRouter",
    // Rendering
    "--force-color-profile=srgb",
    "--hide-scrollbars",
    "--mute-audio",
    "--window-size=1000,800",
    // Misc
    "--disable-breakpad",
    "--disable-infobars",
    "--disable-notifications",
    "--disable-popup-blocking",
    "--no-first-run",
    "--no-default-browser-check",
];

/// Everything needed to spawn one browser process.
pub(crate) struct BrowserConfig {
    debug_port: u16,
    pub(crate) headless: bool,
    pub(crate) temp_dir: CustomTempDir,
    pub(crate) executable_path: PathBuf,
}

impl BrowserConfig {
    pub(crate) fn new(options: &BrowserOptions) -> Result<Self> {
        let executable_path = match &options.executable {
            Some(path) if path.exists() => path.clone(),
            Some(path) => {
                return Err(anyhow!(
                    "Browser executable not found: {}",
                    path.display()
                ));
            }
            None => default_executable()?,
        };

        Ok(Self {
            headless: options.headless,
            executable_path,
            debug_port: get_available_port().context("Failed to get available port")?,
            temp_dir: CustomTempDir::new(std::env::temp_dir().join("html-clip-shot"), "profile")
                .context("Failed to create browser profile directory")?,
        })
    }

    pub(crate) fn get_browser_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.debug_port),
            format!("--user-data-dir={}", self.temp_dir.path().display()),
        ];

        args.extend(DEFAULT_ARGS.iter().map(|s| s.to_string()));
        if self.headless {
            args.push("--headless=new".to_string());
        }

        args
    }
}

fn default_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROME")
        && Path::new(&path).exists()
    {
        return Ok(path.into());
    }

    let apps = [
        "google-chrome-stable",
        "google-chrome",
        "chromium",
        "chromium-browser",
        "microsoft-edge-stable",
        "chrome",
        "msedge",
        "microsoft-edge",
    ];
    for app in apps {
        if let Ok(path) = which(app) {
            return Ok(path);
        }
    }

    #[cfg(target_os = "macos")]
    {
        let macos_apps = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];
        for path in macos_apps.iter() {
            let path = Path::new(path);
            if path.exists() {
                return Ok(path.into());
            }
        }
    }

    #[cfg(windows)]
    {
        if let Some(path) = get_chrome_path_from_registry().filter(|p| p.exists()) {
            return Ok(path);
        }

        let windows_apps = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for path in windows_apps.iter() {
            let path = Path::new(path);
            if path.exists() {
                return Ok(path.into());
            }
        }
    }

    Err(anyhow!(
        "Could not find a Chrome or Edge executable. Set CHROME or pass --chrome."
    ))
}

#[cfg(windows)]
fn get_chrome_path_from_registry() -> Option<PathBuf> {
    RegKey::predef(HKEY_LOCAL_MACHINE)
        .open_subkey("SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\App Paths\\chrome.exe")
        .and_then(|key| key.get_value::<String, _>(""))
        .map(PathBuf::from)
        .ok()
}

fn get_available_port() -> Option<u16> {
    let mut ports: Vec<u16> = (8000..9000).collect();
    ports.shuffle(&mut rand::thread_rng());
    ports.iter().find(|port| port_is_available(**port)).copied()
}

fn port_is_available(port: u16) -> bool {
    net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}
