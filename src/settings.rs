//! Service configuration, read from an optional `settings.toml` and from
//! `SPLITLEDGER__*` environment variables (e.g. `SPLITLEDGER__SERVER__PORT`).
//! `MONGODB_URI` is honoured as well: when set, storage is MongoDB at that URI.
use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::repository::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; any origin when empty.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Storage {
    Memory,
    Mongodb {
        uri: String,
        database: String,
        collection: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retry {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl From<&Retry> for RetryPolicy {
    fn from(value: &Retry) -> Self {
        RetryPolicy {
            max_attempts: value.max_attempts,
            initial_backoff: Duration::from_millis(value.initial_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub log_level: String,
    pub server: Server,
    pub storage: Storage,
    pub retry: Retry,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(
                Environment::with_prefix("SPLITLEDGER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            );
        Self::from_builder(with_mongodb_uri(builder, env::var("MONGODB_URI").ok())?)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        builder
            .set_default("log_level", "info")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080_i64)?
            .set_default("storage.kind", "memory")?
            .set_default("storage.database", "OpenSplit")?
            .set_default("storage.collection", "Groups")?
            .set_default("retry.max_attempts", 3_i64)?
            .set_default("retry.initial_backoff_ms", 100_i64)?
            .build()?
            .try_deserialize()
    }
}

fn with_mongodb_uri(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    uri: Option<String>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    let kind = uri.as_ref().map(|_| "mongodb");
    builder
        .set_override_option("storage.kind", kind)?
        .set_override_option("storage.uri", uri)
}
