use crate::utils::error::{QuerentError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_unique_ids, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 1_000;

/// Top level setup for a querent and the workflow it drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Version of the configuration format.
    pub version: f32,
    pub querent_id: String,
    pub querent_name: String,
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub collectors: Vec<CollectorConfig>,
    #[serde(default)]
    pub engines: Vec<EngineConfig>,
    pub resource: Option<ResourceConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub name: String,
    pub id: String,
    /// Free-form options handed to the workflow.
    #[serde(default)]
    pub config: HashMap<String, String>,
    pub max_retries: Option<u32>,
    pub retry_interval_ms: Option<u64>,
    pub stop_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub id: String,
    pub name: String,
    pub backend: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub id: String,
    pub name: String,
    pub num_workers: Option<u32>,
    pub max_retries: Option<u32>,
    pub retry_interval: Option<u32>,
    pub message_throttle_limit: Option<u32>,
    pub message_throttle_delay: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub id: String,
    pub max_workers_allowed: Option<u32>,
    pub max_workers_per_collector: Option<u32>,
    pub max_workers_per_engine: Option<u32>,
    pub max_workers_per_querent: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
    pub system_stats: Option<bool>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            name: "workflow".to_string(),
            id: "workflow".to_string(),
            config: HashMap::new(),
            max_retries: None,
            retry_interval_ms: None,
            stop_timeout_ms: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 0.1,
            querent_id: "querent".to_string(),
            querent_name: "Querent".to_string(),
            workflow: WorkflowConfig::default(),
            collectors: Vec::new(),
            engines: Vec::new(),
            resource: None,
            monitoring: None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| QuerentError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| QuerentError::internal(format!("env pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn max_workflows(&self) -> Option<usize> {
        self.resource
            .as_ref()
            .and_then(|r| r.max_workers_allowed)
            .map(|n| n as usize)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl WorkflowConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms.unwrap_or(DEFAULT_STOP_TIMEOUT_MS))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms.unwrap_or(DEFAULT_RETRY_INTERVAL_MS))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(0)
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<()> {
        if !(self.version > 0.0) {
            return Err(QuerentError::InvalidConfigValueError {
                field: "version".to_string(),
                value: self.version.to_string(),
                reason: "Version must be positive".to_string(),
            });
        }
        validate_non_empty_string("querent_id", &self.querent_id)?;
        validate_non_empty_string("workflow.id", &self.workflow.id)?;

        validate_unique_ids("collectors", self.collectors.iter().map(|c| c.id.as_str()))?;
        validate_unique_ids("engines", self.engines.iter().map(|e| e.id.as_str()))?;

        let per_engine = self.resource.as_ref().and_then(|r| r.max_workers_per_engine);
        for engine in &self.engines {
            let Some(workers) = engine.num_workers else {
                continue;
            };
            validate_positive_number("engines.num_workers", workers as u64, 1)?;
            if let Some(limit) = per_engine {
                if workers > limit {
                    return Err(QuerentError::InvalidConfigValueError {
                        field: format!("engines.{}.num_workers", engine.id),
                        value: workers.to_string(),
                        reason: format!(
                            "Exceeds resource.max_workers_per_engine ({})",
                            limit
                        ),
                    });
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}
