use std::collections::HashMap;
use std::path::Path;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

use super::{ActionResult, Actioner, InvocationFailure};
use crate::ActionOutput;
use crate::config::DiscordActionerConfig;
use crate::context::RunContext;
use crate::util::truncate;

/// Discord caps embed field values at 1024 characters.
const MAX_FIELD_LEN: usize = 1000;

const COLOR_RED: u32 = 15158332;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self {
            content: None,
            embeds: Vec::new(),
        }
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Posts a failure embed to a Discord webhook
pub struct DiscordActioner {
    client: Client,
    config: DiscordActionerConfig,
}

impl DiscordActioner {
    pub fn new(config: DiscordActionerConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn build_message(
        &self,
        check: &str,
        action: &str,
        prior_output: &str,
        params: &HashMap<String, String>,
    ) -> Message {
        let mut fields = vec![
            EmbedField {
                name: "🔎 Check".to_string(),
                value: format!("`{check}`"),
                inline: true,
            },
            EmbedField {
                name: "⚙️ Action".to_string(),
                value: format!("`{action}`"),
                inline: true,
            },
        ];

        let mut params: Vec<_> = params.iter().collect();
        params.sort();
        for (key, value) in params {
            fields.push(EmbedField {
                name: key.clone(),
                value: value.clone(),
                inline: true,
            });
        }

        if !prior_output.trim().is_empty() {
            fields.push(EmbedField {
                name: "📄 Output".to_string(),
                value: format!("```\n{}\n```", truncate(prior_output.trim(), MAX_FIELD_LEN)),
                inline: false,
            });
        }

        let embed = Embed {
            title: Some("🔴 Check Failed".to_string()),
            description: Some(format!("Check **{check}** failed")),
            color: Some(COLOR_RED),
            fields,
            footer: Some(EmbedFooter {
                text: format!("algowatch | {check}"),
            }),
            timestamp: Some(Utc::now().to_rfc3339()),
        };

        let mut builder = MessageBuilder::new().add_embed(embed);
        if let Some(user_id) = &self.config.user_id {
            builder = builder.content(format!("🔴 Check: `{check}` <@{user_id}>"));
        }
        builder.build()
    }
}

#[async_trait]
impl Actioner for DiscordActioner {
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
        let message = self.build_message(ctx.check(), action, prior_output, params);

        let request = self.client.post(&self.config.url).json(&message).send();
        let response = tokio::select! {
            response = request => response,
            _ = ctx.cancelled() => {
                output.error = Some("discord message cancelled".to_string());
                return Err(InvocationFailure::new(output, anyhow!("discord message cancelled")));
            }
        };

        match response {
            Ok(response) => {
                let status = response.status();
                output.combined_out = response.text().await.unwrap_or_default();
                if status.is_success() {
                    info!("Successfully sent Discord message");
                    output.rc = 0;
                } else {
                    error!("Discord message failed with status: {status}");
                    error!("Discord API error response: {}", output.combined_out);
                    output.rc = i32::from(status.as_u16());
                }
                output.settle();
                Ok(output)
            }
            Err(e) => {
                error!("Failed to send Discord message: {e}");
                output.error = Some(e.to_string());
                Err(InvocationFailure::new(output, e.into()))
            }
        }
    }
}
