//! Server configuration.
//!
//! Options come from an optional TOML file plus mirrored command-line flags;
//! a flag given on the command line overrides the file value, and anything
//! left unset falls back to the built-in defaults.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not open the configuration file {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("{path} is not well formed: {source}")]
    Malformed {
        path: String,
        source: toml::de::Error,
    },
}

/// Command-line flags. Every recognized config option has a mirror here.
#[derive(Debug, Default, Parser)]
#[command(
    name = "saltfish",
    version,
    about = "Dataset metadata and record-storage service"
)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "SALTFISH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen endpoint, e.g. 127.0.0.1:5555.
    #[arg(long)]
    pub bind_str: Option<String>,

    /// Prefix of the per-dataset record buckets.
    #[arg(long)]
    pub records_bucket_prefix: Option<String>,

    /// Bucket holding schema snapshots.
    #[arg(long)]
    pub schemas_bucket: Option<String>,

    /// Cap on the number of ids a single GenerateId call may request.
    #[arg(long)]
    pub max_generate_id_count: Option<u32>,

    /// Modulus for the random secondary index stamped on records.
    #[arg(long)]
    pub max_random_index: Option<u64>,

    #[arg(long)]
    pub riak_host: Option<String>,
    #[arg(long)]
    pub riak_port: Option<u16>,

    #[arg(long)]
    pub maria_db_host: Option<String>,
    #[arg(long)]
    pub maria_db_port: Option<u16>,
    #[arg(long)]
    pub maria_db_db: Option<String>,
    #[arg(long)]
    pub maria_db_user: Option<String>,
    #[arg(long)]
    pub maria_db_password: Option<String>,

    #[arg(long)]
    pub redis_host: Option<String>,
    #[arg(long)]
    pub redis_port: Option<u16>,
    #[arg(long)]
    pub redis_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    bind_str: Option<String>,
    records_bucket_prefix: Option<String>,
    schemas_bucket: Option<String>,
    max_generate_id_count: Option<u32>,
    max_random_index: Option<u64>,
    riak: Option<FileRiak>,
    maria_db: Option<FileMariaDb>,
    redis: Option<FileRedis>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileRiak {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileMariaDb {
    host: Option<String>,
    port: Option<u16>,
    db: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileRedis {
    host: Option<String>,
    port: Option<u16>,
    key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiakConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MariaDbConfig {
    pub host: String,
    pub port: u16,
    pub db: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub key: String,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_str: String,
    pub records_bucket_prefix: String,
    pub schemas_bucket: String,
    pub max_generate_id_count: u32,
    pub max_random_index: u64,
    pub riak: RiakConfig,
    pub maria_db: MariaDbConfig,
    pub redis: RedisConfig,
}

impl ServerConfig {
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => parse_file(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::merge(cli, file))
    }

    fn merge(cli: &Cli, file: FileConfig) -> Self {
        let riak = file.riak.unwrap_or_default();
        let maria_db = file.maria_db.unwrap_or_default();
        let redis = file.redis.unwrap_or_default();

        Self {
            bind_str: pick(&cli.bind_str, file.bind_str, "127.0.0.1:5555"),
            records_bucket_prefix: pick(
                &cli.records_bucket_prefix,
                file.records_bucket_prefix,
                "records/",
            ),
            schemas_bucket: pick(&cli.schemas_bucket, file.schemas_bucket, "schemas"),
            max_generate_id_count: cli
                .max_generate_id_count
                .or(file.max_generate_id_count)
                .unwrap_or(1000),
            max_random_index: cli
                .max_random_index
                .or(file.max_random_index)
                .unwrap_or(i64::MAX as u64),
            riak: RiakConfig {
                host: pick(&cli.riak_host, riak.host, "127.0.0.1"),
                port: cli.riak_port.or(riak.port).unwrap_or(10017),
            },
            maria_db: MariaDbConfig {
                host: pick(&cli.maria_db_host, maria_db.host, "127.0.0.1"),
                port: cli.maria_db_port.or(maria_db.port).unwrap_or(3306),
                db: pick(&cli.maria_db_db, maria_db.db, "saltfish"),
                user: pick(&cli.maria_db_user, maria_db.user, "saltfish"),
                password: pick(&cli.maria_db_password, maria_db.password, ""),
            },
            redis: RedisConfig {
                host: pick(&cli.redis_host, redis.host, "127.0.0.1"),
                port: cli.redis_port.or(redis.port).unwrap_or(6379),
                key: pick(&cli.redis_key, redis.key, "saltfish:pub"),
            },
        }
    }
}

fn pick(cli: &Option<String>, file: Option<String>, default: &str) -> String {
    cli.clone()
        .or(file)
        .unwrap_or_else(|| default.to_string())
}

fn parse_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Malformed {
        path: path.display().to_string(),
        source,
    })
}
