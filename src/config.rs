use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, bail};
use regex::Regex;
use tracing::{trace, warn};

/// Check names end up in temp-dir prefixes, metric labels and audit keys.
static CHECK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid check name regex"));

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory audit log (lost on restart)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./algowatch.db")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Storage configuration (defaults to SQLite at `./algowatch.db`)
    #[serde(default)]
    pub storage: StorageConfig,

    /// Parent directory for per-run working directories (defaults to the system temp dir)
    pub base_working_dir: Option<PathBuf>,

    /// Address of the `/metrics` and audit API listener
    #[serde(default = "crate::util::get_metrics_addr")]
    pub metrics_listen_addr: SocketAddr,

    #[serde(default)]
    pub datasources: Vec<Datasource>,

    #[serde(default)]
    pub algorithmers: Vec<AlgorithmerConfig>,

    #[serde(default)]
    pub actioners: Vec<ActionerConfig>,

    #[serde(default)]
    pub checks: Vec<Check>,
}

impl Config {
    /// Reject configurations the scheduler cannot run.
    ///
    /// Unknown datasources or backend types are only warned about: they fail
    /// the affected runs, not the process.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut names = HashSet::new();
        for check in &self.checks {
            if !CHECK_NAME.is_match(&check.name) {
                bail!("invalid check name '{}'", check.name);
            }
            if !names.insert(check.name.as_str()) {
                bail!("duplicate check name '{}'", check.name);
            }
            if check.interval == 0 {
                bail!("check '{}' has an interval of 0", check.name);
            }

            for input in &check.inputs {
                if self.datasource(&input.datasource).is_none() {
                    warn!(
                        "check '{}' references unknown datasource '{}'",
                        check.name, input.datasource
                    );
                }
            }
            if !self
                .algorithmers
                .iter()
                .any(|a| a.kind() == check.algorithmer_type)
            {
                warn!(
                    "check '{}' references unknown algorithmer type '{}'",
                    check.name, check.algorithmer_type
                );
            }
            for action in &check.actions {
                if !self.actioners.iter().any(|a| a.kind() == action.actioner) {
                    warn!(
                        "action '{}' of check '{}' references unknown actioner type '{}'",
                        action.name, check.name, action.actioner
                    );
                }
            }
        }
        Ok(())
    }

    pub fn datasource(&self, name: &str) -> Option<&Datasource> {
        self.datasources.iter().find(|d| d.name == name)
    }
}

/// Named source for metric retrieval
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Datasource {
    pub name: String,
    pub url: String,
}

/// A periodically evaluated condition
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Check {
    pub name: String,

    /// Scheduling period in seconds
    pub interval: u64,

    /// Run once at start-up before entering the periodic loop
    #[serde(default)]
    pub immediate: bool,

    pub algorithmer_type: String,
    pub algorithm: String,
    #[serde(default)]
    pub algorithm_params: HashMap<String, String>,

    #[serde(default)]
    pub inputs: Vec<Input>,

    /// Dispatched in order when the check fails
    #[serde(default)]
    pub actions: Vec<ActionMeta>,

    #[serde(default)]
    pub debug: bool,
}

impl Check {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

/// A measurement fetched before the algorithm runs
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Input {
    /// Key of the result in the algorithm's inputs map
    pub name: String,

    /// Name of a configured [`Datasource`]
    pub datasource: String,

    /// PromQL expression
    pub query: String,

    /// Turns the instant query into a range query
    pub range: Option<QueryRange>,
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct QueryRange {
    /// Seconds to look back from now
    pub lookback: u64,

    /// Resolution step in seconds
    pub step: u64,
}

/// An action dispatched when a check fails
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ActionMeta {
    pub name: String,

    /// Registry key of the actioner backend
    pub actioner: String,

    /// Variant of the action (script name, message template, ...)
    pub action: String,

    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Algorithm backend descriptor
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AlgorithmerConfig {
    Python(PythonAlgorithmerConfig),
}

impl AlgorithmerConfig {
    /// Registry key this descriptor answers to
    pub fn kind(&self) -> &'static str {
        match self {
            AlgorithmerConfig::Python(_) => "python",
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PythonAlgorithmerConfig {
    /// Virtualenv to activate before running
    pub venv: Option<PathBuf>,

    /// Directory holding `<algorithm>.py` scripts
    pub directory: PathBuf,

    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    #[serde(default)]
    pub env_override: HashMap<String, String>,
}

fn default_interpreter() -> String {
    String::from("python")
}

/// Action backend descriptor
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionerConfig {
    Script(ScriptActionerConfig),
    Webhook(WebhookActionerConfig),
    Discord(DiscordActionerConfig),
}

impl ActionerConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionerConfig::Script(_) => "script",
            ActionerConfig::Webhook(_) => "webhook",
            ActionerConfig::Discord(_) => "discord",
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ScriptActionerConfig {
    /// Directory holding one executable per action name
    pub directory: PathBuf,

    #[serde(default)]
    pub env_override: HashMap<String, String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct WebhookActionerConfig {
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_webhook_timeout")]
    pub timeout: u64,
}

fn default_webhook_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DiscordActionerConfig {
    pub url: String,
    pub user_id: Option<String>,
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config {path}"))?;
    serde_json::from_str(&file_content)
        .with_context(|| format!("invalid configuration file provided: {path}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
