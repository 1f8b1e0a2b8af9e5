use config::{Config, ConfigError, Environment, File};
use docinject::AgentConfig;
use serde::{Deserialize, Serialize};
use std::env;

/// Conventional variables that override individual keys
const KEY_OVERRIDES: [&str; 5] = [
    "CONTEXT7_API_KEY",
    "OPENAI_API_KEY",
    "OPIK_API_KEY",
    "OPIK_WORKSPACE",
    "MEMMACHINE_URL",
];

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("DOCINJECT").separator("__"))
            .build()?;

        let mut settings: Settings = s.try_deserialize()?;
        settings.apply_overrides(|name| env::var(name).ok());
        Ok(settings)
    }

    /// Apply the conventional service variables on top of the layered config
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for name in KEY_OVERRIDES {
            let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let agent = &mut self.agent;
            match name {
                "CONTEXT7_API_KEY" => agent.source.api_key = Some(value),
                "OPENAI_API_KEY" => agent.arbiter.api_key = Some(value),
                "OPIK_API_KEY" => agent.telemetry.api_key = Some(value),
                "OPIK_WORKSPACE" => agent.telemetry.workspace = Some(value),
                "MEMMACHINE_URL" => agent.history.base_url = value,
                _ => {},
            }
        }
    }
}
