use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info, instrument};

use super::{ActionResult, Actioner, InvocationFailure};
use crate::ActionOutput;
use crate::config::WebhookActionerConfig;
use crate::context::RunContext;

/// Posts a JSON notification for a failed check
///
/// `rc` is 0 on a 2xx response and the HTTP status code otherwise.
pub struct WebhookActioner {
    client: Client,
    url: String,
}

impl WebhookActioner {
    pub fn new(config: WebhookActionerConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            url: config.url,
        })
    }
}

#[async_trait]
impl Actioner for WebhookActioner {
    #[instrument(skip_all, fields(check = %ctx.check(), action = %action))]
    async fn act(
        &self,
        ctx: &RunContext,
        action: &str,
        prior_output: &str,
        params: &HashMap<String, String>,
        _working_dir: &Path,
    ) -> ActionResult {
        let mut output = ActionOutput::pending(Utc::now());

        let payload = json!({
            "check": ctx.check(),
            "action": action,
            "params": params,
            "output": prior_output,
            "timestamp": output.timestamp.to_rfc3339(),
        });

        let request = self.client.post(&self.url).json(&payload).send();
        let response = tokio::select! {
            response = request => response,
            _ = ctx.cancelled() => {
                output.error = Some("webhook cancelled".to_string());
                return Err(InvocationFailure::new(output, anyhow!("webhook cancelled")));
            }
        };

        match response {
            Ok(response) => {
                let status = response.status();
                output.combined_out = response.text().await.unwrap_or_default();
                if status.is_success() {
                    info!("Successfully sent webhook notification");
                    output.rc = 0;
                } else {
                    error!("Webhook notification failed with status: {status}");
                    output.rc = i32::from(status.as_u16());
                }
                output.settle();
                Ok(output)
            }
            Err(e) => {
                error!("Failed to send webhook notification: {e}");
                output.error = Some(e.to_string());
                Err(InvocationFailure::new(output, e.into()))
            }
        }
    }
}
