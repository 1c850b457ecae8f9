use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::{HttpConfig, WeeekConfig};
use crate::payload::TaskPayload;

/// Client for the Weeek task-creation endpoint
pub struct WeeekClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    http: HttpConfig,
    clock: Arc<dyn Clock>,
}

impl WeeekClient {
    pub fn new(weeek: &WeeekConfig, http: &HttpConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(http.connect_timeout())
            .read_timeout(http.read_timeout())
            .timeout(http.attempt_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: weeek.tasks_url(),
            api_key: weeek.api_key.clone(),
            http: http.clone(),
            clock,
        })
    }

    /// Create a task, retrying non-2xx responses and transport errors.
    /// Returns whether the task was created; failures are only logged.
    pub async fn submit(&self, payload: &TaskPayload) -> bool {
        let attempts = self.http.max_attempts;

        for attempt in 1..=attempts {
            match self.send(payload).await {
                Ok((status, body)) if status.is_success() => {
                    info!("Task created in Weeek. Status={} Body={}", status, body);
                    return true;
                }
                Ok((status, body)) => {
                    warn!(
                        "Weeek API error. Attempt={}/{} Status={} Body={}",
                        attempt, attempts, status, body
                    );
                }
                Err(e) => {
                    error!(
                        "Weeek API request failed on attempt {}/{}: {:#}",
                        attempt, attempts, e
                    );
                }
            }

            if attempt < attempts {
                let delay = self.http.backoff(attempt);
                debug!("Retrying Weeek request in {:?}", delay);
                self.clock.sleep(delay).await;
            }
        }

        error!("Giving up on Weeek task after {} attempts", attempts);
        false
    }

    async fn send(&self, payload: &TaskPayload) -> Result<(StatusCode, String)> {
        debug!("Sending task to Weeek: {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await
            .context("Failed to send request to Weeek")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }
}
