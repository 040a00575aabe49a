use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::info;

/// One server to query, as `host[:port]` (the port defaults to 123 at
/// query time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
}

impl From<&str> for ServerConfig {
    fn from(addr: &str) -> Self {
        ServerConfig {
            addr: addr.to_string(),
        }
    }
}

// Accept both `servers = ["pool.ntp.org"]` and
// `[[servers]] addr = "pool.ntp.org"` forms.
impl<'de> Deserialize<'de> for ServerConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ServerConfigVisitor;

        impl<'de> Visitor<'de> for ServerConfigVisitor {
            type Value = ServerConfig;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("string or map")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<ServerConfig, E> {
                Ok(ServerConfig::from(value))
            }

            fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<ServerConfig, M::Error> {
                let mut addr = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "addr" => {
                            if addr.is_some() {
                                return Err(de::Error::duplicate_field("addr"));
                            }
                            addr = Some(map.next_value::<String>()?);
                        }
                        _ => {
                            return Err(de::Error::unknown_field(&key, &["addr"]));
                        }
                    }
                }
                let addr = addr.ok_or_else(|| de::Error::missing_field("addr"))?;
                Ok(ServerConfig { addr })
            }
        }

        deserializer.deserialize_any(ServerConfigVisitor)
    }
}

fn default_timeout_ms() -> u64 {
    sundial_client::Query::DEFAULT_TIMEOUT.as_millis() as u64
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    /// Total time a query may take before it is cancelled, in
    /// milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub log_filter: Option<String>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error while reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("config toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Config {
    fn from_file(file: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(file)?;
        Ok(toml::from_str(&contents)?)
    }

    fn from_first_file(file: Option<impl AsRef<Path>>) -> Result<Config, ConfigError> {
        // An explicitly given file is always the one that is used.
        if let Some(file) = file {
            return Config::from_file(file);
        }

        // Try sundial.toml in the working directory, or skip if absent.
        match Config::from_file("./sundial.toml") {
            Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => {}
            other => return other,
        }

        // For the global file, permission errors are also ignored.
        match Config::from_file("/etc/sundial.toml") {
            Err(ConfigError::Io(e))
                if e.kind() == ErrorKind::NotFound || e.kind() == ErrorKind::PermissionDenied => {}
            other => return other,
        }

        Ok(Config::default())
    }

    pub fn from_args(
        file: Option<impl AsRef<Path>>,
        servers: Vec<ServerConfig>,
    ) -> Result<Config, ConfigError> {
        let mut config = Config::from_first_file(file)?;

        if !servers.is_empty() {
            if !config.servers.is_empty() {
                info!("overriding servers from configuration");
            }
            config.servers = servers;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_server_forms() {
        #[derive(Deserialize, Debug)]
        struct TestConfig {
            server: ServerConfig,
        }

        let test: TestConfig = toml::from_str("server = \"pool.ntp.org\"").unwrap();
        assert_eq!(test.server.addr, "pool.ntp.org");

        let test: TestConfig = toml::from_str("server = \"pool.ntp.org:5678\"").unwrap();
        assert_eq!(test.server.addr, "pool.ntp.org:5678");

        let test: TestConfig = toml::from_str("[server]\naddr = \"pool.ntp.org\"").unwrap();
        assert_eq!(test.server.addr, "pool.ntp.org");

        assert!(toml::from_str::<TestConfig>("[server]\nport = 123").is_err());
    }

    #[test]
    fn deserialize_full_config() {
        let config: Config = toml::from_str(
            "servers = [\"0.pool.ntp.org\", \"1.pool.ntp.org:123\"]\n\
             log_filter = \"sundial_client=debug\"\n\
             [query]\n\
             timeout_ms = 2500\n",
        )
        .unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].addr, "0.pool.ntp.org");
        assert_eq!(config.query.timeout_ms, 2500);
        assert_eq!(config.log_filter.as_deref(), Some("sundial_client=debug"));
    }

    #[test]
    fn defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.servers.is_empty());
        assert_eq!(config.query.timeout_ms, 5000);
        assert_eq!(config.log_filter, None);
    }

    #[test]
    fn args_take_precedence() {
        let merged =
            Config::from_args(None::<&Path>, vec![ServerConfig::from("b.example")]).unwrap();
        assert_eq!(merged.servers, vec![ServerConfig::from("b.example")]);
        assert_eq!(merged.query.timeout_ms, 5000);
    }
}
