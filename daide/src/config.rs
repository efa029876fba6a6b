use std::{error::Error, path::Path};

use serde::Deserialize;

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Hold,
    Rand,
}

fn config_default_host() -> String {
    "127.0.0.1".to_owned()
}

fn config_default_port() -> u16 {
    daide_util::connection::DEFAULT_PORT
}

fn config_default_name() -> String {
    "daide".to_owned()
}

fn config_default_version() -> String {
    "1.0".to_owned()
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "config_default_host")]
    pub host: String,
    #[serde(default = "config_default_port")]
    pub port: u16,
    #[serde(default = "config_default_name")]
    pub name: String,
    #[serde(default = "config_default_version")]
    pub version: String,
    #[serde(default)]
    pub observe: bool,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default, rename = "timeout-secs")]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// First existing path wins; with none, every field defaults.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Config, Box<dyn Error>> {
        for path in paths {
            if path.as_ref().exists() {
                return Ok(toml::from_str(&std::fs::read_to_string(path)?)?);
            }
        }
        Ok(toml::from_str("")?)
    }
}

#[cfg(test)]
mod test {
    use super::{Config, Strategy};

    #[test]
    fn defaults_apply_to_an_empty_file() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 16713);
        assert_eq!(config.strategy, Strategy::Hold);
        assert!(!config.observe);
        assert_eq!(config.timeout_secs, None);
    }

    #[test]
    fn fields_override_defaults() {
        let config: Config = toml::from_str(
            r#"
            host = "daide.example.net"
            port = 16714
            name = "holdbot"
            strategy = "rand"
            observe = true
            timeout-secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.host, "daide.example.net");
        assert_eq!(config.port, 16714);
        assert_eq!(config.name, "holdbot");
        assert_eq!(config.strategy, Strategy::Rand);
        assert!(config.observe);
        assert_eq!(config.timeout_secs, Some(30));
    }
}
