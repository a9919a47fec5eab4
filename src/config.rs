use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::generator::WaveformParameters;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "wavegen.toml";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    pub instrument: InstrumentConfig,
    pub redis: RedisConfig,
    pub waveform: WaveformParameters,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InstrumentConfig {
    /// VISA resource string, e.g. `TCPIP::192.168.1.100::INSTR`
    pub resource: String,
    pub timeout_ms: u64,
    pub baud_rate: u32,
    /// Socket port used when a TCPIP resource does not name one
    pub default_port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// Key holding the pending remote command
    pub key: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            resource: "TCPIP::192.168.1.100::INSTR".to_string(),
            timeout_ms: 2000,
            baud_rate: 9600,
            default_port: 5025,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            key: "waveform_command".to_string(),
        }
    }
}

impl AppConfig {
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.redis.host, self.redis.port)
    }
}

/// Load configuration: defaults, then the TOML file, then `WAVEGEN__*` environment overrides.
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
        builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
    }

    builder = builder.add_source(
        Environment::with_prefix("WAVEGEN")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let config: AppConfig = config.try_deserialize()?;
    config
        .waveform
        .validate()
        .map_err(|e| ConfigError::Message(e.to_string()))?;
    Ok(config)
}
