use std::time::Duration;

use async_trait::async_trait;
use thirtyfour::extensions::cdp::ChromeDevTools;
use thirtyfour::prelude::*;
use thirtyfour::{ChromeCapabilities, ChromiumLikeCapabilities};
use tokio::time::{self, Instant};

use crate::browser::{BrowserSession, CapturedResponse, SessionLauncher};
use crate::HarvestError;

pub const DEFAULT_DRIVER_ADDR: &str = "http://localhost:9515";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

// Runs before any page script. Wraps XMLHttpRequest and fetch so that every
// background response body lands in window.__harvestCaptured.
const CAPTURE_HOOK: &str = r#"
(() => {
  if (window.__harvestCaptured) return;
  window.__harvestCaptured = [];
  const record = (url, body) => {
    try { window.__harvestCaptured.push({ url: String(url || ''), body: String(body) }); } catch (_) {}
  };

  const open = XMLHttpRequest.prototype.open;
  XMLHttpRequest.prototype.open = function (method, url) {
    this.__harvestUrl = url;
    return open.apply(this, arguments);
  };
  const send = XMLHttpRequest.prototype.send;
  XMLHttpRequest.prototype.send = function () {
    this.addEventListener('load', () => {
      const url = this.responseURL || this.__harvestUrl;
      if (this.responseType === '' || this.responseType === 'text') {
        record(url, this.responseText);
      } else if (this.responseType === 'json') {
        record(url, JSON.stringify(this.response));
      }
    });
    return send.apply(this, arguments);
  };

  const fetch = window.fetch;
  window.fetch = function () {
    return fetch.apply(this, arguments).then((resp) => {
      resp.clone().text().then((body) => record(resp.url, body)).catch(() => {});
      return resp;
    });
  };
})();
"#;

const DRAIN_SCRIPT: &str = r#"
const captured = window.__harvestCaptured || [];
window.__harvestCaptured = [];
return captured;
"#;

#[derive(Clone, Debug)]
pub struct BrowserOptions {
    pub driver_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub viewport: (u32, u32),
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            driver_url: DEFAULT_DRIVER_ADDR.to_owned(),
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            viewport: (1280, 720),
        }
    }
}

/// Launches one Chrome session per call through a chromedriver endpoint.
/// chromedriver starts a separate browser process for every session.
pub struct WebDriverLauncher {
    options: BrowserOptions,
}

impl WebDriverLauncher {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    fn capabilities(&self) -> WebDriverResult<ChromeCapabilities> {
        let mut caps = DesiredCapabilities::chrome();
        if self.options.headless {
            caps.set_headless()?;
        }
        let (width, height) = self.options.viewport;
        caps.add_arg(&format!("--window-size={width},{height}"))?;
        caps.add_arg(&format!("--user-agent={}", self.options.user_agent))?;
        caps.add_arg("--disable-dev-shm-usage")?;
        Ok(caps)
    }
}

#[async_trait]
impl SessionLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, HarvestError> {
        let launch_err = |e: WebDriverError| HarvestError::Launch { msg: e.to_string() };

        let caps = self.capabilities().map_err(launch_err)?;
        let driver = WebDriver::new(self.options.driver_url.as_str(), caps)
            .await
            .map_err(launch_err)?;

        // Install the capture hook for every document this page loads
        let dev_tools = ChromeDevTools::new(driver.handle.clone());
        let installed = dev_tools
            .execute_cdp_with_params(
                "Page.addScriptToEvaluateOnNewDocument",
                serde_json::json!({ "source": CAPTURE_HOOK }),
            )
            .await;
        if let Err(e) = installed {
            if let Err(quit_err) = driver.quit().await {
                tracing::warn!(error = %quit_err, "failed to quit half-initialized session");
            }
            return Err(launch_err(e));
        }

        Ok(Box::new(WebDriverSession { driver }))
    }
}

pub struct WebDriverSession {
    driver: WebDriver,
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), HarvestError> {
        let timeout_err = || HarvestError::FetchTimeout {
            url: url.to_owned(),
            timeout,
        };

        self.driver.set_page_load_timeout(timeout).await?;
        // The driver enforces the page load timeout; the outer bound only guards
        // against a driver that stops answering.
        match time::timeout(timeout + Duration::from_secs(5), self.driver.goto(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::debug!(url, error = %e, "navigation failed");
                Err(timeout_err())
            }
            Err(_) => Err(timeout_err()),
        }
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, HarvestError> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.driver.find_all(By::Css(selector)).await?.is_empty() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn take_responses(&mut self) -> Result<Vec<CapturedResponse>, HarvestError> {
        let ret = self.driver.execute(DRAIN_SCRIPT, Vec::new()).await?;
        serde_json::from_value(ret.json().clone()).map_err(|e| HarvestError::Browser {
            msg: format!("unreadable capture buffer: {e}"),
        })
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, HarvestError> {
        let ret = self.driver.execute(script, Vec::new()).await?;
        Ok(ret.json().clone())
    }

    async fn text(&mut self, selector: &str) -> Result<Option<String>, HarvestError> {
        match self.driver.find_all(By::Css(selector)).await?.first() {
            Some(elem) => Ok(Some(elem.text().await?)),
            None => Ok(None),
        }
    }

    async fn attributes(
        &mut self,
        selector: &str,
        name: &str,
    ) -> Result<Vec<String>, HarvestError> {
        let mut values = Vec::new();
        for elem in self.driver.find_all(By::Css(selector)).await? {
            if let Some(v) = elem.attr(name).await? {
                values.push(v);
            }
        }
        Ok(values)
    }

    async fn current_url(&mut self) -> Result<String, HarvestError> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn close(self: Box<Self>) -> Result<(), HarvestError> {
        self.driver.quit().await?;
        Ok(())
    }
}
