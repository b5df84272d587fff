//! Capability registry
//!
//! Maps the type strings checks and actions declare to backend instances.
//! Resolution is a linear scan where the first match wins; it has no side
//! effects, so the executor may resolve on every run.

use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use super::discord::DiscordActioner;
use super::python::PythonAlgorithmer;
use super::script::ScriptActioner;
use super::webhook::WebhookActioner;
use super::{Actioner, Algorithmer};
use crate::config::{ActionerConfig, AlgorithmerConfig};

#[derive(Clone, Default)]
pub struct Registry {
    algorithmers: Vec<(String, Arc<dyn Algorithmer>)>,
    actioners: Vec<(String, Arc<dyn Actioner>)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate one backend per configured descriptor, in declaration order.
    pub fn from_config(
        algorithmers: &[AlgorithmerConfig],
        actioners: &[ActionerConfig],
    ) -> anyhow::Result<Self> {
        let mut registry = Self::new();

        for descriptor in algorithmers {
            let backend: Arc<dyn Algorithmer> = match descriptor {
                AlgorithmerConfig::Python(config) => {
                    Arc::new(PythonAlgorithmer::new(config.clone()))
                }
            };
            registry = registry.with_algorithmer(descriptor.kind(), backend);
        }

        for descriptor in actioners {
            let backend: Arc<dyn Actioner> = match descriptor {
                ActionerConfig::Script(config) => Arc::new(ScriptActioner::new(config.clone())),
                ActionerConfig::Webhook(config) => Arc::new(
                    WebhookActioner::new(config.clone())
                        .context("failed to build webhook actioner")?,
                ),
                ActionerConfig::Discord(config) => Arc::new(DiscordActioner::new(config.clone())),
            };
            registry = registry.with_actioner(descriptor.kind(), backend);
        }

        debug!(
            "registry built with {} algorithmers and {} actioners",
            registry.algorithmers.len(),
            registry.actioners.len()
        );

        Ok(registry)
    }

    pub fn with_algorithmer(mut self, kind: impl Into<String>, backend: Arc<dyn Algorithmer>) -> Self {
        self.algorithmers.push((kind.into(), backend));
        self
    }

    pub fn with_actioner(mut self, kind: impl Into<String>, backend: Arc<dyn Actioner>) -> Self {
        self.actioners.push((kind.into(), backend));
        self
    }

    pub fn resolve_algorithmer(&self, kind: &str) -> Option<Arc<dyn Algorithmer>> {
        self.algorithmers
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, backend)| backend.clone())
    }

    pub fn resolve_actioner(&self, kind: &str) -> Option<Arc<dyn Actioner>> {
        self.actioners
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, backend)| backend.clone())
    }
}
