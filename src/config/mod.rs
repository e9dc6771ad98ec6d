mod types;

pub use types::*;

use crate::{Error, Result};
use std::{env, path::Path};
use tracing::debug;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Loads the service configuration.
///
/// `CONFIG_PATH` names the YAML file; without it `config.yaml` is read when
/// present and built-in defaults are used otherwise. `MODEL_ID` and
/// `MODEL_PATH` override the model section.
pub async fn load() -> Result<Config> {
    let mut config = match env::var("CONFIG_PATH") {
        Ok(config_path) => load_from_file(&config_path).await?,
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            load_from_file(DEFAULT_CONFIG_PATH).await?
        }
        Err(_) => {
            debug!("No configuration file found, using defaults");
            Config::default()
        }
    };

    if let Ok(model_id) = env::var("MODEL_ID") {
        config.model.id = model_id;
    }
    if let Ok(model_path) = env::var("MODEL_PATH") {
        config.model.path = Some(model_path);
    }

    validate(&config)?;
    Ok(config)
}

pub async fn load_from_file(config_path: &str) -> Result<Config> {
    debug!("Loading configuration from: {}", config_path);

    let config_str = tokio::fs::read_to_string(config_path).await?;
    parse(&config_str)
}

/// Parses a YAML document; an empty document yields the defaults.
pub fn parse(config_str: &str) -> Result<Config> {
    if config_str.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(config_str)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.model.id.trim().is_empty() && config.model.path.is_none() {
        return Err(Error::config("model.id must not be empty"));
    }
    if config.model.max_length == Some(0) {
        return Err(Error::config("model.max_length must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.logs.level, "info");
        assert_eq!(
            config.model.id,
            "distilbert-base-uncased-finetuned-sst-2-english"
        );
        assert_eq!(config.model.revision, "main");
        assert_eq!(config.model.device, DeviceKind::Cpu);
        assert!(config.model.path.is_none());
        assert!(config.model.max_length.is_none());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = parse("server:\n  port: 9000\nmodel:\n  device: auto\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.model.device, DeviceKind::Auto);
        assert_eq!(config.model.revision, "main");
    }

    #[test]
    fn test_unknown_device_rejected() {
        let err = parse("model:\n  device: tpu\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn test_zero_max_length_rejected() {
        let config = parse("model:\n  max_length: 0\n").unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("max_length"));
    }

    #[test]
    fn test_blank_model_id_without_path_rejected() {
        let config = parse("model:\n  id: \"\"\n").unwrap();
        assert!(validate(&config).is_err());

        let config = parse("model:\n  id: \"\"\n  path: /models/sst2\n").unwrap();
        assert!(validate(&config).is_ok());
    }
}
