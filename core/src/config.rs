//! Service configuration.
//!
//! Configuration is a TOML document; credentials may be supplied or
//! overridden through environment variables so they stay out of the file.
//!
//! ```toml
//! enabled = true
//!
//! [schedule]
//! new_lost_items = "0 0 2 * * *"
//! workflow_decisions = "0 */15 * * * *"
//!
//! [folio]
//! okapi_base_url = "https://okapi.example.edu"
//! tenant_id = "diku"
//! username = "lost-items"
//! new_lost_items_statuses = ["Aged to lost", "Declared lost"]
//! statistical_code_in_workflow = "…uuid…"
//!
//! [folio.item_notes]
//! lost_item_workflow_tag = "…uuid…"
//! lost_item_workflow_comment = "…uuid…"
//! lost_item_workflow_patron_requesting = "…uuid…"
//!
//! [workflow_server]
//! base_url = "https://workflow.example.edu"
//! username = "lost-items"
//! approved_status = "Approved"
//! denied_status = "Denied"
//! ```

use crate::error::ConfigError;
use crate::lifecycle::{ApprovalPolicy, LifecycleRules};
use crate::notes::NoteChannel;
use crate::query::DiscoveryCriteria;
use cron::Schedule;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "LOST_ITEMS_CONFIG";

/// Configuration file used when [`CONFIG_PATH_VAR`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "lost-items.toml";

/// A credential that never shows up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a credential.
    #[must_use]
    pub const fn new(value: String) -> Self {
        Self(value)
    }

    /// The credential itself.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LostItemsConfig {
    /// Master switch; a disabled service exits after logging.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron schedules of the two triggers.
    pub schedule: ScheduleConfig,
    /// Catalog connection and conventions.
    pub folio: FolioConfig,
    /// Workflow service connection and decision labels.
    pub workflow_server: WorkflowServerConfig,
    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Cron schedules (six fields, seconds first).
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// When to look for newly lost items.
    pub new_lost_items: String,
    /// When to poll the workflow for decisions.
    pub workflow_decisions: String,
}

/// Catalog (FOLIO) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FolioConfig {
    /// Base URL of the Okapi gateway.
    pub okapi_base_url: String,
    /// Tenant identifier.
    pub tenant_id: String,
    /// API username.
    #[serde(default)]
    pub username: String,
    /// API password.
    #[serde(default)]
    pub password: Secret,
    /// Maximum items per discovery run; unlimited when absent.
    #[serde(default)]
    pub new_lost_items_limit: Option<usize>,
    /// Item status names that qualify as lost.
    #[serde(default)]
    pub new_lost_items_statuses: Vec<String>,
    /// Only pick up items a patron asked to have replaced.
    #[serde(default)]
    pub new_lost_items_patron_requesting_only: bool,
    /// Statistical code marking items damaged beyond repair.
    #[serde(default)]
    pub damaged_beyond_repair_code: Option<String>,
    /// Maximum items per reconciliation run; unlimited when absent.
    #[serde(default)]
    pub workflow_items_limit: Option<usize>,
    /// Statistical code marking items in the workflow.
    pub statistical_code_in_workflow: String,
    /// Statistical code type grouping retention-agreement codes.
    #[serde(default)]
    pub statistical_code_type_retention_agreement: Option<String>,
    /// Instance status set when an instance is suppressed.
    #[serde(default)]
    pub withdrawn_instance_status_id: Option<String>,
    /// Note types used as metadata channels.
    pub item_notes: ItemNotesConfig,
}

/// Item note type identifiers.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemNotesConfig {
    /// Carries the workflow correlation key.
    pub lost_item_workflow_tag: String,
    /// Carries decision comments.
    pub lost_item_workflow_comment: String,
    /// Carries the requesting patron's username.
    pub lost_item_workflow_patron_requesting: String,
    /// Carries a usage count from a previous system.
    #[serde(default)]
    pub legacy_checkouts: Option<String>,
}

/// Workflow service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowServerConfig {
    /// Base URL of the workflow API.
    pub base_url: String,
    /// Basic-auth username.
    #[serde(default)]
    pub username: String,
    /// Basic-auth password.
    #[serde(default)]
    pub password: Secret,
    /// Request status meaning "approved".
    pub approved_status: String,
    /// Request status meaning "denied".
    pub denied_status: String,
    /// What an approval does to the item.
    #[serde(default)]
    pub approval_policy: ApprovalPolicy,
}

/// Logging and metrics settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Default log level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Address for the Prometheus exporter; disabled when absent.
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_addr: None,
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LostItemsConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document does not match the schema.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        toml::from_str(document).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&document)
    }

    /// Load from the file named by `LOST_ITEMS_CONFIG`, apply credential
    /// overrides from the process environment, and validate.
    ///
    /// # Errors
    ///
    /// Returns any read, parse or validation error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Replace credentials with values from `lookup` where present.
    ///
    /// Recognised names: `FOLIO_USERNAME`, `FOLIO_PASSWORD`,
    /// `WORKFLOW_USERNAME`, `WORKFLOW_PASSWORD`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("FOLIO_USERNAME") {
            self.folio.username = value;
        }
        if let Some(value) = lookup("FOLIO_PASSWORD") {
            self.folio.password = Secret::new(value);
        }
        if let Some(value) = lookup("WORKFLOW_USERNAME") {
            self.workflow_server.username = value;
        }
        if let Some(value) = lookup("WORKFLOW_PASSWORD") {
            self.workflow_server.password = Secret::new(value);
        }
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Validation`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schedule.validate()?;
        self.folio.validate()?;
        self.workflow_server.validate()?;
        self.observability.validate()
    }

    /// Predicates for the discovery search.
    #[must_use]
    pub fn discovery_criteria(&self) -> DiscoveryCriteria {
        let folio = &self.folio;
        DiscoveryCriteria {
            statuses: folio.new_lost_items_statuses.clone(),
            damaged_code: folio.damaged_beyond_repair_code.clone(),
            patron_requesting_note_type: folio
                .new_lost_items_patron_requesting_only
                .then(|| folio.item_notes.lost_item_workflow_patron_requesting.clone()),
            in_workflow_code: folio.statistical_code_in_workflow.clone(),
        }
    }

    /// Note channel for the configured note types.
    #[must_use]
    pub fn note_channel(&self) -> NoteChannel {
        let notes = &self.folio.item_notes;
        NoteChannel::new(
            notes.lost_item_workflow_tag.clone(),
            notes.lost_item_workflow_patron_requesting.clone(),
            notes.lost_item_workflow_comment.clone(),
            notes.legacy_checkouts.clone(),
        )
    }

    /// Lifecycle conventions.
    #[must_use]
    pub fn lifecycle_rules(&self) -> LifecycleRules {
        LifecycleRules {
            in_workflow_code: self.folio.statistical_code_in_workflow.clone(),
            notes: self.note_channel(),
            approval_policy: self.workflow_server.approval_policy,
        }
    }
}

impl ScheduleConfig {
    /// Parsed discovery schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an invalid cron expression.
    pub fn new_lost_items_schedule(&self) -> Result<Schedule, ConfigError> {
        parse_cron("schedule.new_lost_items", &self.new_lost_items)
    }

    /// Parsed reconciliation schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an invalid cron expression.
    pub fn workflow_decisions_schedule(&self) -> Result<Schedule, ConfigError> {
        parse_cron("schedule.workflow_decisions", &self.workflow_decisions)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.new_lost_items_schedule()?;
        self.workflow_decisions_schedule()?;
        Ok(())
    }
}

impl FolioConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require("folio.okapi_base_url", &self.okapi_base_url)?;
        require("folio.tenant_id", &self.tenant_id)?;
        require("folio.username", &self.username)?;
        require("folio.password", self.password.expose())?;
        require("folio.statistical_code_in_workflow", &self.statistical_code_in_workflow)?;
        require("folio.item_notes.lost_item_workflow_tag", &self.item_notes.lost_item_workflow_tag)?;
        require(
            "folio.item_notes.lost_item_workflow_comment",
            &self.item_notes.lost_item_workflow_comment,
        )?;
        require(
            "folio.item_notes.lost_item_workflow_patron_requesting",
            &self.item_notes.lost_item_workflow_patron_requesting,
        )?;

        let has_status = self.new_lost_items_statuses.iter().any(|s| !s.trim().is_empty());
        let has_damage = self
            .damaged_beyond_repair_code
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if !has_status && !has_damage {
            return Err(ConfigError::Validation(
                "folio.new_lost_items_statuses or folio.damaged_beyond_repair_code must select something"
                    .to_string(),
            ));
        }

        for (name, limit) in [
            ("folio.new_lost_items_limit", self.new_lost_items_limit),
            ("folio.workflow_items_limit", self.workflow_items_limit),
        ] {
            if limit == Some(0) {
                return Err(ConfigError::Validation(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}

impl WorkflowServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require("workflow_server.base_url", &self.base_url)?;
        require("workflow_server.username", &self.username)?;
        require("workflow_server.password", self.password.expose())?;
        require("workflow_server.approved_status", &self.approved_status)?;
        require("workflow_server.denied_status", &self.denied_status)?;
        if self.approved_status == self.denied_status {
            return Err(ConfigError::Validation(
                "workflow_server.approved_status and denied_status must differ".to_string(),
            ));
        }
        Ok(())
    }
}

impl ObservabilityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "invalid log_level: {}. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }
        if let Some(addr) = &self.metrics_addr {
            addr.parse::<std::net::SocketAddr>().map_err(|e| {
                ConfigError::Validation(format!("invalid observability.metrics_addr {addr}: {e}"))
            })?;
        }
        Ok(())
    }
}

fn require(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{name} cannot be empty")));
    }
    Ok(())
}

fn parse_cron(name: &str, expression: &str) -> Result<Schedule, ConfigError> {
    Schedule::from_str(expression)
        .map_err(|e| ConfigError::Validation(format!("{name} `{expression}` is not a valid cron expression: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
        [schedule]
        new_lost_items = "0 0 2 * * *"
        workflow_decisions = "0 */15 * * * *"

        [folio]
        okapi_base_url = "https://okapi.example.edu"
        tenant_id = "diku"
        username = "svc"
        password = "from-file"
        new_lost_items_statuses = ["Aged to lost", "Declared lost"]
        new_lost_items_limit = 120
        statistical_code_in_workflow = "wf"

        [folio.item_notes]
        lost_item_workflow_tag = "corr"
        lost_item_workflow_comment = "comment"
        lost_item_workflow_patron_requesting = "patron"

        [workflow_server]
        base_url = "https://workflow.example.edu"
        username = "svc"
        password = "secret"
        approved_status = "Approved"
        denied_status = "Denied"
        approval_policy = "on-order"
    "#;

    #[test]
    fn test_parse_and_validate() {
        let config = LostItemsConfig::from_toml_str(DOCUMENT).unwrap();
        assert!(config.enabled);
        assert_eq!(config.folio.new_lost_items_limit, Some(120));
        assert_eq!(config.folio.workflow_items_limit, None);
        assert_eq!(config.workflow_server.approval_policy, ApprovalPolicy::OnOrder);
        assert_eq!(config.observability.log_level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_overrides_replace_credentials() {
        let mut config = LostItemsConfig::from_toml_str(DOCUMENT).unwrap();
        config.apply_overrides(|name| (name == "FOLIO_PASSWORD").then(|| "from-env".to_string()));
        assert_eq!(config.folio.password.expose(), "from-env");
        assert_eq!(config.workflow_server.password.expose(), "secret");
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = LostItemsConfig::from_toml_str(DOCUMENT).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("from-file"));
        assert!(debug.contains("Secret(***)"));
    }

    #[test]
    fn test_rejects_missing_selection() {
        let mut config = LostItemsConfig::from_toml_str(DOCUMENT).unwrap();
        config.folio.new_lost_items_statuses.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.folio.damaged_beyond_repair_code = Some("dmg".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_cron() {
        let mut config = LostItemsConfig::from_toml_str(DOCUMENT).unwrap();
        config.schedule.workflow_decisions = "every tuesday".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(msg)) if msg.contains("workflow_decisions")));
    }

    #[test]
    fn test_rejects_zero_limit() {
        let mut config = LostItemsConfig::from_toml_str(DOCUMENT).unwrap();
        config.folio.workflow_items_limit = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_patron_requesting_only_adds_note_type() {
        let mut config = LostItemsConfig::from_toml_str(DOCUMENT).unwrap();
        assert_eq!(config.discovery_criteria().patron_requesting_note_type, None);
        config.folio.new_lost_items_patron_requesting_only = true;
        assert_eq!(
            config.discovery_criteria().patron_requesting_note_type.as_deref(),
            Some("patron")
        );
    }

    #[test]
    fn test_example_file_is_valid_with_env_credentials() {
        let mut config =
            LostItemsConfig::from_toml_str(include_str!("../../lost-items.example.toml")).unwrap();
        config.apply_overrides(|name| Some(format!("{name}-value")));

        config.validate().unwrap();
        assert_eq!(config.folio.username, "FOLIO_USERNAME-value");
        assert_eq!(config.workflow_server.approval_policy, ApprovalPolicy::Withdraw);
    }
}
