pub mod builder;
pub mod querent_config;

pub use builder::ConfigBuilder;
pub use querent_config::{
    CollectorConfig, Config, EngineConfig, MonitoringConfig, ResourceConfig, WorkflowConfig,
};

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "querent")]
#[command(about = "Runs a querent workflow and streams its events")]
pub struct CliConfig {
    /// Path to a TOML configuration file; defaults are used when omitted
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Validate the configuration and exit")]
    pub dry_run: bool,

    /// Number of progress ticks the mock workflow reports; overrides `workflow.config.ticks`
    #[arg(long)]
    pub ticks: Option<u32>,

    /// Delay between ticks in milliseconds; overrides `workflow.config.tick_ms`
    #[arg(long)]
    pub tick_ms: Option<u64>,

    #[arg(long, help = "Log when runtime worker threads stay busy too long")]
    pub detect_busy: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads the configuration and layers the explicit command-line overrides on top.
    pub fn load_config(&self) -> crate::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        let options = &mut config.workflow.config;
        if let Some(ticks) = self.ticks {
            options.insert("ticks".to_string(), ticks.to_string());
        }
        if let Some(tick_ms) = self.tick_ms {
            options.insert("tick_ms".to_string(), tick_ms.to_string());
        }
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use crate::app::MockWorkflow;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TICKING: &str = r#"
version = 0.1
querent_id = "q"
querent_name = "Q"

[workflow]
name = "w"
id = "w"

[workflow.config]
ticks = "1"
tick_ms = "10"
"#;

    fn config_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TICKING.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_file_options_survive_without_flags() {
        let file = config_file();
        let path = file.path().to_str().unwrap();
        let cli = CliConfig::try_parse_from(["querent", "--config", path]).unwrap();
        assert!(cli.ticks.is_none());

        let config = cli.load_config().unwrap();
        assert_eq!(config.workflow.config.get("ticks").unwrap(), "1");
        assert_eq!(config.workflow.config.get("tick_ms").unwrap(), "10");
        assert!(MockWorkflow::from_workflow_config(&config.workflow).is_ok());
    }

    #[test]
    fn test_flags_override_file_options() {
        let file = config_file();
        let path = file.path().to_str().unwrap();
        let cli =
            CliConfig::try_parse_from(["querent", "--config", path, "--ticks", "7"]).unwrap();

        let config = cli.load_config().unwrap();
        assert_eq!(config.workflow.config.get("ticks").unwrap(), "7");
        assert_eq!(config.workflow.config.get("tick_ms").unwrap(), "10");
    }

    #[test]
    fn test_defaults_without_file_or_flags() {
        let cli = CliConfig::try_parse_from(["querent"]).unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config, Config::default());
    }
}
