use crate::transport::{Transport, TransportResponse, next_id};
use crate::types::{ElementRect, ImageFormat, Rect, Viewport};
use crate::utils::{self, send_and_get_msg};
use anyhow::{Context, Result, anyhow};
use base64::Engine;
use log::debug;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};

/// Collects the client rects of every descendant of the first match of a selector.
const DESCENDANT_RECTS_JS: &str = r#"
(() => {
    const container = document.querySelector(SELECTOR_PLACEHOLDER);
    if (!container) return null;
    return Array.from(container.querySelectorAll('*'), el => {
        const r = el.getBoundingClientRect();
        return { left: r.left, top: r.top, right: r.right, bottom: r.bottom, width: r.width, height: r.height };
    });
})()
"#;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Represents a CDP browser tab (target) session.
pub struct Tab {
    pub(crate) transport: Arc<Transport>,
    pub(crate) session_id: String,
    pub(crate) target_id: String,
}

impl Tab {
    /// Creates a new blank tab and attaches to it.
    pub(crate) async fn new(transport: Arc<Transport>) -> Result<Self> {
        let TransportResponse::Response(res_create) = transport
            .send(json!({ "id": next_id(), "method": "Target.createTarget", "params": { "url": "about:blank" } }))
            .await? else { return Err(anyhow!("Invalid response type")); };

        let target_id = res_create.result["targetId"]
            .as_str()
            .context("No targetId")?
            .to_string();

        let TransportResponse::Response(res_attach) = transport
            .send(json!({ "id": next_id(), "method": "Target.attachToTarget", "params": { "targetId": target_id } }))
            .await? else { return Err(anyhow!("Invalid response type")); };

        let session_id = res_attach.result["sessionId"]
            .as_str()
            .context("No sessionId")?
            .to_string();

        Ok(Self {
            transport,
            session_id,
            target_id,
        })
    }

    pub(crate) async fn send_cmd(&self, method: &str, params: Value) -> Result<Value> {
        let msg_id = next_id();
        let msg = json!({
            "id": msg_id,
            "method": method,
            "params": params
        })
        .to_string();
        let res = send_and_get_msg(self.transport.clone(), msg_id, &self.session_id, msg).await?;
        utils::serde_msg(&res).with_context(|| format!("{} failed", method))
    }

    /// Evaluates `expression` in the page, awaiting promises, and returns its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .send_cmd(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true
                }),
            )
            .await?;
        if let Some(details) = result["result"].get("exceptionDetails") {
            let text = details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("script threw");
            return Err(anyhow!("Evaluation failed: {}", text));
        }
        Ok(result["result"]["result"]["value"].clone())
    }

    /// Navigates to `url` and waits until the page reports network idle.
    pub async fn goto(&self, url: &str, timeout: Duration) -> Result<&Self> {
        self.send_cmd("Page.enable", json!({})).await?;
        self.send_cmd("Page.setLifecycleEventsEnabled", json!({ "enabled": true }))
            .await?;

        // Subscribe before navigating so no lifecycle event is missed.
        let mut events = self
            .transport
            .subscribe(&self.session_id, "Page.lifecycleEvent")
            .await?;

        let nav = self
            .send_cmd("Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error) = nav["result"]["errorText"].as_str() {
            return Err(anyhow!("Navigation to {} failed: {}", url, error));
        }
        let loader_id = nav["result"]["loaderId"].as_str().map(str::to_string);

        time::timeout(timeout, async {
            while let Some(event) = events.recv().await {
                let same_load = loader_id.is_none() || event["loaderId"].as_str() == loader_id.as_deref();
                if same_load && event["name"] == "networkIdle" {
                    return Ok(());
                }
            }
            Err(anyhow!("Event channel closed"))
        })
        .await
        .map_err(|_| anyhow!("Timeout waiting for network idle on {}", url))??;

        debug!("Network idle on {}", url);
        Ok(self)
    }

    pub async fn wait_fonts_ready(&self) -> Result<&Self> {
        self.evaluate("document.fonts.ready.then(() => true)").await?;
        Ok(self)
    }

    /// Polls for `selector` until it matches or `timeout` elapses.
    pub async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let expression = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(selector)?
        );
        let deadline = Instant::now() + timeout;

        loop {
            if self.evaluate(&expression).await?.as_bool() == Some(true) {
                return Ok(true);
            }
            if Instant::now() + SELECTOR_POLL_INTERVAL > deadline {
                return Ok(false);
            }
            time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    /// Rendered rectangles of all descendants of the first `selector` match, or `None`
    /// when nothing matches.
    pub async fn descendant_rects(&self, selector: &str) -> Result<Option<Vec<ElementRect>>> {
        let expression =
            DESCENDANT_RECTS_JS.replace("SELECTOR_PLACEHOLDER", &serde_json::to_string(selector)?);
        let value = self.evaluate(&expression).await?;
        serde_json::from_value(value).context("Unexpected element rect payload")
    }

    pub async fn set_viewport(&self, viewport: &Viewport) -> Result<&Self> {
        self.send_cmd(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": viewport.width,
                "height": viewport.height,
                "deviceScaleFactor": viewport.device_scale_factor,
                "mobile": false
            }),
        )
        .await?;
        Ok(self)
    }

    /// Captures `clip` and returns the decoded image bytes.
    ///
    /// The clip may reach past the viewport; the surface is captured beyond it.
    pub async fn capture_clip(
        &self,
        clip: &Rect,
        format: ImageFormat,
        quality: Option<u8>,
    ) -> Result<Vec<u8>> {
        let mut params = json!({
            "format": format.as_str(),
            "clip": { "x": clip.x, "y": clip.y, "width": clip.width, "height": clip.height, "scale": 1.0 },
            "fromSurface": true,
            "captureBeyondViewport": true,
        });
        if let Some(q) = quality.filter(|_| format.supports_quality()) {
            params["quality"] = json!(q);
        }

        self.activate().await?;
        let result = self.send_cmd("Page.captureScreenshot", params).await?;
        let data = result["result"]["data"]
            .as_str()
            .context("No image data received")?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .context("Screenshot payload is not valid base64")
    }

    /// Activates the target tab to bring it to the foreground.
    pub async fn activate(&self) -> Result<&Self> {
        let TransportResponse::Response(_) = self
            .transport
            .send(json!({ "id": next_id(), "method": "Target.activateTarget", "params": { "targetId": self.target_id } }))
            .await? else { return Err(anyhow!("Invalid response type")); };
        Ok(self)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Closes the target tab.
    pub async fn close(&self) -> Result<()> {
        self.transport
            .send(json!({ "id": next_id(), "method": "Target.closeTarget", "params": { "targetId": self.target_id } }))
            .await?;
        Ok(())
    }
}
