//! Measurement collaborator
//!
//! Turns a check input into a query against a Prometheus-compatible backend
//! and hands the typed result to the algorithm.
//!
//! ```text
//! Input { datasource, query, range? } → GET <url>/api/v1/query[_range] → MeasurementResult
//! ```

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

use crate::config::{Datasource, Input};
use crate::context::RunContext;

/// Shape of a query result as reported by the Prometheus HTTP API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Vector,
    Matrix,
    Scalar,
    String,
}

/// Typed result of one measurement, passed opaquely to the algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    #[serde(rename = "resultType")]
    pub result_type: ResultType,
    pub result: serde_json::Value,
}

/// Fetches the measurement an input names
#[async_trait]
pub trait Measurer: Send + Sync {
    /// Must give up once `ctx` is cancelled.
    async fn measure(
        &self,
        ctx: &RunContext,
        datasource: &Datasource,
        input: &Input,
    ) -> Result<MeasurementResult>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    data: Option<MeasurementResult>,
    error: Option<String>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
}

/// Prometheus HTTP API client
///
/// One client is shared by every check and datasource.
pub struct PrometheusMeasurer {
    client: reqwest::Client,
}

impl PrometheusMeasurer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }

    fn request(&self, datasource: &Datasource, input: &Input) -> reqwest::RequestBuilder {
        let base = datasource.url.trim_end_matches('/');
        match input.range {
            None => self
                .client
                .get(format!("{base}/api/v1/query"))
                .query(&[("query", input.query.as_str())]),
            Some(range) => {
                let end = Utc::now().timestamp();
                let start = end - range.lookback as i64;
                self.client
                    .get(format!("{base}/api/v1/query_range"))
                    .query(&[
                        ("query", input.query.clone()),
                        ("start", start.to_string()),
                        ("end", end.to_string()),
                        ("step", range.step.max(1).to_string()),
                    ])
            }
        }
    }

    async fn fetch(&self, datasource: &Datasource, input: &Input) -> Result<MeasurementResult> {
        let response = self
            .request(datasource, input)
            .send()
            .await
            .context("failed to send query")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read response body")?;

        // the API reports query errors as JSON with a 4xx/5xx status
        let parsed: ApiResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(e).context("failed to parse query response");
            }
            Err(_) => bail!("HTTP error: {status}"),
        };

        if parsed.status != "success" {
            bail!(
                "query failed ({}): {}",
                parsed.error_type.as_deref().unwrap_or("unknown"),
                parsed.error.as_deref().unwrap_or("no error message")
            );
        }

        parsed.data.context("query response carried no data")
    }
}

#[async_trait]
impl Measurer for PrometheusMeasurer {
    #[instrument(skip_all, fields(check = %ctx.check(), input = %input.name, datasource = %datasource.name))]
    async fn measure(
        &self,
        ctx: &RunContext,
        datasource: &Datasource,
        input: &Input,
    ) -> Result<MeasurementResult> {
        trace!("querying {}: {}", datasource.url, input.query);

        tokio::select! {
            result = self.fetch(datasource, input) => result,
            _ = ctx.cancelled() => bail!("measurement cancelled"),
        }
    }
}
