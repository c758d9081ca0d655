use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::process::{Child, Command};
use tokio::time;
use tracing::info;
use tweet_harvest::browser::SessionLauncher;

const READY_ATTEMPTS: usize = 30;

/// A chromedriver started by this process. Killed when dropped.
pub struct DriverProcess {
    _child: Child,
}

impl DriverProcess {
    /// Start the driver at `path` listening on the port of `driver_url` and wait
    /// until `launcher` can open a session through it.
    pub async fn spawn(
        path: &Path,
        driver_url: &str,
        launcher: &impl SessionLauncher,
    ) -> Result<Self> {
        let port = url::Url::parse(driver_url)?
            .port_or_known_default()
            .with_context(|| format!("no port in driver url {driver_url}"))?;

        let child = Command::new(path)
            .arg(format!("--port={port}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("unable to start {path:?}"))?;

        for _ in 0..READY_ATTEMPTS {
            if let Ok(session) = launcher.launch().await {
                session.close().await?;
                return Ok(Self { _child: child });
            }
            info!("waiting for driver...");
            time::sleep(Duration::from_secs(1)).await;
        }

        bail!("driver at {driver_url} did not become ready")
    }
}
