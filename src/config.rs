//! Runtime configuration.
//!
//! Everything the engine needs from the environment is collected here once at
//! startup and injected as `Arc<Config>`. Nothing below the server reads
//! environment variables directly.
//!
//! # Environment
//!
//! | Variable | Default |
//! |----------|---------|
//! | `LINEAR_API_KEY` | unset (per-link keys are used) |
//! | `GITHUB_API_KEY` | unset (per-link keys are used) |
//! | `LINEAR_APPLICATION_ADMIN_KEY` | unset (anonymous fallback disabled) |
//! | `ENCRYPTION_KEY` | unset |
//! | `OPENAI_API_KEY` | unset (rewording disabled) |
//! | `OPENAI_API_BASE` | `https://api.openai.com/v1` |
//! | `OPENAI_MODEL` | `gpt-4.1` |
//! | `TRACKER_SYNC_BIND` | `0.0.0.0:3000` |
//! | `TRACKER_SYNC_STORE` | `./tracker-sync.json` |
//! | `JULES_CHECK_DELAY_SECS` | `60` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default listen address.
const DEFAULT_BIND: ([u8; 4], u16) = ([0, 0, 0, 0], 3000);

/// Default location of the JSON mapping store.
const DEFAULT_STORE_PATH: &str = "./tracker-sync.json";

/// Default delay before checking for the agent's rate-limit comment.
const DEFAULT_CHECK_DELAY_SECS: u64 = 60;

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1";

/// Globally configured tokens that take precedence over per-link credentials.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    /// Used for every Linear call when set.
    pub linear_api_key: Option<String>,
    /// Used for every GitHub call when set.
    pub github_api_key: Option<String>,
    /// Application-level Linear key. Required for anonymous events.
    pub linear_admin_key: Option<String>,
}

/// A GitHub label that maps onto Linear's native priority field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityLabel {
    pub name: String,
    pub priority: u8,
}

impl PriorityLabel {
    fn new(name: &str, priority: u8) -> Self {
        PriorityLabel {
            name: name.to_string(),
            priority,
        }
    }
}

/// Label names the dispatcher reacts to.
#[derive(Debug, Clone)]
pub struct LabelConfig {
    /// Adding this label to an unmirrored issue mirrors it (matched case-insensitively).
    pub promote_label: String,
    pub priority_labels: Vec<PriorityLabel>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        LabelConfig {
            promote_label: "linear".to_string(),
            priority_labels: vec![
                PriorityLabel::new("Urgent", 1),
                PriorityLabel::new("High", 2),
                PriorityLabel::new("Medium", 3),
                PriorityLabel::new("Low", 4),
            ],
        }
    }
}

impl LabelConfig {
    /// Returns the Linear priority for a GitHub label name, if it is a priority label.
    pub fn priority_for(&self, label: &str) -> Option<u8> {
        self.priority_labels
            .iter()
            .find(|p| p.name == label)
            .map(|p| p.priority)
    }
}

/// Settings for the automation agent retry subsystem.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Label that hands an issue to the agent.
    pub active_label: String,
    /// Label parked on issues waiting for a retry.
    pub queued_label: String,
    /// Label meaning a human has taken over; the sweep never touches these issues.
    pub human_label: String,
    /// Substring of the agent bot's login.
    pub bot_login: String,
    /// Prefix of the comment the agent posts when it is at its concurrency limit.
    pub rate_limit_phrase: String,
    /// Delay between assignment and the rate-limit check.
    pub check_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            active_label: "jules".to_string(),
            queued_label: "jules-queue".to_string(),
            human_label: "Human".to_string(),
            bot_login: "google-labs-jules".to_string(),
            rate_limit_phrase: "You are currently at your concurrent task limit".to_string(),
            check_delay: Duration::from_secs(DEFAULT_CHECK_DELAY_SECS),
        }
    }
}

/// Connection settings for the rewording model.
#[derive(Debug, Clone)]
pub struct RewriteConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub overrides: CredentialOverrides,
    pub labels: LabelConfig,
    pub agent: AgentConfig,
    /// Key for the credential cipher (hex or raw 32 bytes).
    pub encryption_key: Option<String>,
    pub rewrite: Option<RewriteConfig>,
    pub bind_addr: SocketAddr,
    pub store_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            overrides: CredentialOverrides::default(),
            labels: LabelConfig::default(),
            agent: AgentConfig::default(),
            encryption_key: None,
            rewrite: None,
            bind_addr: SocketAddr::from(DEFAULT_BIND),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset. Unparseable numbers and addresses
    /// fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Config::default();

        let check_delay = get("JULES_CHECK_DELAY_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.agent.check_delay);

        let rewrite = get("OPENAI_API_KEY").map(|api_key| RewriteConfig {
            api_key,
            api_base: get("OPENAI_API_BASE").unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        });

        Config {
            overrides: CredentialOverrides {
                linear_api_key: get("LINEAR_API_KEY"),
                github_api_key: get("GITHUB_API_KEY"),
                linear_admin_key: get("LINEAR_APPLICATION_ADMIN_KEY"),
            },
            agent: AgentConfig {
                check_delay,
                ..defaults.agent
            },
            encryption_key: get("ENCRYPTION_KEY"),
            rewrite,
            bind_addr: get("TRACKER_SYNC_BIND")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bind_addr),
            store_path: get("TRACKER_SYNC_STORE")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            labels: defaults.labels,
        }
    }

    /// Returns true if anonymous (repository-scoped) processing is possible.
    pub fn admin_key_configured(&self) -> bool {
        self.overrides.linear_admin_key.is_some()
    }
}
