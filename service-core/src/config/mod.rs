use crate::error::AppError;
use config::{Config as Cfg, File, FileFormat};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Settings shared by every service process.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Prod,
}

fn default_service_name() -> String {
    "media-library".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        load_section("configuration", "APP")
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }
}

/// Load a settings section from an optional file named `file_name` (any format
/// supported by the `config` crate) overlaid with `{PREFIX}__*` environment
/// variables.
pub fn load_section<T: DeserializeOwned>(file_name: &str, env_prefix: &str) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let config = Cfg::builder()
        .add_source(File::with_name(file_name).required(false))
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

/// Deserialize a settings section from an inline TOML document.
pub fn from_toml_str<T: DeserializeOwned>(source: &str) -> Result<T, AppError> {
    let config = Cfg::builder()
        .add_source(File::from_str(source, FileFormat::Toml))
        .build()?;

    Ok(config.try_deserialize()?)
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: Config = from_toml_str("").unwrap();
        assert_eq!(config.environment, Environment::Dev);
        assert_eq!(config.log_level, "info");
        assert!(config.otlp_endpoint.is_none());
        assert!(!config.is_prod());
    }

    #[test]
    fn test_prod_environment_from_toml() {
        let config: Config = from_toml_str(
            r#"
            environment = "prod"
            service_name = "gallery"
            log_level = "warn"
            otlp_endpoint = "http://tempo:4317"
            "#,
        )
        .unwrap();
        assert!(config.is_prod());
        assert_eq!(config.service_name, "gallery");
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://tempo:4317"));
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Prod));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_invalid_document_is_config_error() {
        let result: Result<Config, AppError> = from_toml_str("environment = [");
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
