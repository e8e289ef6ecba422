use super::querent_config::{
    CollectorConfig, Config, EngineConfig, MonitoringConfig, ResourceConfig, WorkflowConfig,
};

/// Fluent construction of a [`Config`]; anything left unset takes the default.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    version: Option<f32>,
    querent_id: Option<String>,
    querent_name: Option<String>,
    workflow: Option<WorkflowConfig>,
    collectors: Vec<CollectorConfig>,
    engines: Vec<EngineConfig>,
    resource: Option<ResourceConfig>,
    monitoring: Option<MonitoringConfig>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: f32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn querent_id(mut self, querent_id: impl Into<String>) -> Self {
        self.querent_id = Some(querent_id.into());
        self
    }

    pub fn querent_name(mut self, querent_name: impl Into<String>) -> Self {
        self.querent_name = Some(querent_name.into());
        self
    }

    pub fn workflow(mut self, workflow: WorkflowConfig) -> Self {
        self.workflow = Some(workflow);
        self
    }

    pub fn collector(mut self, collector: CollectorConfig) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn collectors(mut self, collectors: Vec<CollectorConfig>) -> Self {
        self.collectors = collectors;
        self
    }

    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engines.push(engine);
        self
    }

    pub fn engines(mut self, engines: Vec<EngineConfig>) -> Self {
        self.engines = engines;
        self
    }

    pub fn resource(mut self, resource: ResourceConfig) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn monitoring(mut self, monitoring: MonitoringConfig) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    pub fn build(self) -> Config {
        let defaults = Config::default();
        Config {
            version: self.version.unwrap_or(defaults.version),
            querent_id: self.querent_id.unwrap_or(defaults.querent_id),
            querent_name: self.querent_name.unwrap_or(defaults.querent_name),
            workflow: self.workflow.unwrap_or(defaults.workflow),
            collectors: self.collectors,
            engines: self.engines,
            resource: self.resource,
            monitoring: self.monitoring,
        }
    }
}
