use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::types::*;

pub struct KioskClient {
    client: reqwest::Client,
    base_url: String,
}

impl KioskClient {
    pub fn new(host: &str) -> Self {
        let client = reqwest::Client::builder()
            // stopping an app that ignores SIGTERM takes up to the grace period
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: format!("http://{host}"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get_status(&self) -> Result<StatusResponse> {
        let resp = self
            .client
            .get(self.url("/status"))
            .send()
            .await
            .context("GET /status")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("GET /status returned {status}");
        }
        resp.json().await.context("parsing status JSON")
    }

    /// The currently running app, if any.
    pub async fn active(&self) -> Result<Option<String>> {
        let status = self.get_status().await?;
        if status.active_scripts.len() > 1 {
            bail!("more than one app running: {:?}", status.active_scripts);
        }
        Ok(status.active_scripts.into_iter().next())
    }

    pub async fn start_raw(&self, app: &str) -> Result<reqwest::Response> {
        self.client
            .get(self.url(&format!("/start/{app}")))
            .send()
            .await
            .with_context(|| format!("GET /start/{app}"))
    }

    pub async fn stop_raw(&self, app: &str) -> Result<reqwest::Response> {
        self.client
            .get(self.url(&format!("/stop/{app}")))
            .send()
            .await
            .with_context(|| format!("GET /stop/{app}"))
    }

    /// Status code and parsed body of `/start/{app}`.
    pub async fn start(&self, app: &str) -> Result<(u16, ActionResponse)> {
        let resp = self.start_raw(app).await?;
        let code = resp.status().as_u16();
        let body = resp.json().await.context("parsing start response")?;
        Ok((code, body))
    }

    /// Status code and parsed body of `/stop/{app}`.
    pub async fn stop(&self, app: &str) -> Result<(u16, ActionResponse)> {
        let resp = self.stop_raw(app).await?;
        let code = resp.status().as_u16();
        let body = resp.json().await.context("parsing stop response")?;
        Ok((code, body))
    }

    /// Make sure `app` runs, whatever ran before.
    pub async fn ensure_running(&self, app: &str) -> Result<()> {
        let (code, body) = self.start(app).await?;
        if code != 200 && code != 409 {
            bail!("starting {app} returned {code}: {}", body.message);
        }
        Ok(())
    }

    /// Stop whatever is running.
    pub async fn stop_all(&self) -> Result<()> {
        if let Some(app) = self.active().await? {
            let (code, body) = self.stop(&app).await?;
            if code != 200 {
                bail!("stopping {app} returned {code}: {}", body.message);
            }
        }
        Ok(())
    }
}
