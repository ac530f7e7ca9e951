use clap::{Parser, ValueEnum};
use rewriter_cache::invalidation::DEFAULT_STREAM_KEY;
use rewriter_cache::RedisStreamConfig;
use rewriter_core::settings::{
    parse_bool, parse_sites, DEFAULT_CORE_DATABASE, DEFAULT_IGNORED_PATH_PREFIXES,
    DEFAULT_IGNORE_FOR_SITES,
};
use rewriter_core::{ConfigurationError, ItemId, RewriterSettings};
use rewriter_telemetry::TelemetryConfig;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "REWRITER_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "REWRITER_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "REWRITER_MYSQL_DSN";
pub const SEED_FILE_ENV: &str = "REWRITER_SEED_FILE";
pub const REDIS_URL_ENV: &str = "REWRITER_REDIS_URL";
pub const INVALIDATION_STREAM_ENV: &str = "REWRITER_INVALIDATION_STREAM";
pub const INVALIDATION_POLL_MS_ENV: &str = "REWRITER_INVALIDATION_POLL_MS";
pub const DEFAULT_SCHEME_ENV: &str = "REWRITER_DEFAULT_SCHEME";
pub const SITES_ENV: &str = "REWRITER_SITES";
pub const OTLP_ENDPOINT_ENV: &str = "REWRITER_OTLP_ENDPOINT";
pub const JSON_LOGS_ENV: &str = "REWRITER_JSON_LOGS";
pub const ADMIN_TOKEN_ENV: &str = "REWRITER_ADMIN_TOKEN";

pub const RULES_FOLDER_ID_ENV: &str = "REWRITER_RULES_FOLDER_ID";
pub const RULES_TABLE_ITEM_ID_ENV: &str = "REWRITER_RULES_TABLE_ITEM_ID";
pub const REMOVE_TRAILING_SLASH_ENV: &str = "REWRITER_REMOVE_TRAILING_SLASH";
pub const LOG_REWRITES_ENV: &str = "REWRITER_LOG_REWRITES";
pub const ENABLED_ENV: &str = "REWRITER_ENABLED";
pub const CORE_DATABASE_ENV: &str = "REWRITER_CORE_DATABASE";
pub const IGNORE_FOR_SITES_ENV: &str = "REWRITER_IGNORE_FOR_SITES";
pub const IGNORED_PATH_PREFIXES_ENV: &str = "REWRITER_IGNORED_PATH_PREFIXES";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_INVALIDATION_POLL_MS: u64 = 500;
pub const DEFAULT_REQUEST_SCHEME: &str = "http";
pub const SERVICE_NAME: &str = "rewriter-gateway";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "rewriter-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    /// JSON file with items to load into the in-memory backend.
    #[arg(long, env = SEED_FILE_ENV)]
    pub seed_file: Option<PathBuf>,

    /// Redis server carrying cache invalidations; without it invalidations
    /// stay within this process.
    #[arg(long, env = REDIS_URL_ENV)]
    pub redis_url: Option<String>,

    #[arg(long, env = INVALIDATION_STREAM_ENV, default_value = DEFAULT_STREAM_KEY)]
    pub invalidation_stream: String,

    #[arg(long, env = INVALIDATION_POLL_MS_ENV, default_value_t = DEFAULT_INVALIDATION_POLL_MS)]
    pub invalidation_poll_ms: u64,

    #[arg(long, env = DEFAULT_SCHEME_ENV, default_value = DEFAULT_REQUEST_SCHEME)]
    pub default_scheme: String,

    /// Site bindings as `name=host@database`.
    #[arg(long = "site", env = SITES_ENV, value_delimiter = ';')]
    pub sites: Vec<String>,

    #[arg(long, env = OTLP_ENDPOINT_ENV)]
    pub otlp_endpoint: Option<String>,

    #[arg(long, env = JSON_LOGS_ENV)]
    pub json_logs: bool,

    /// Bearer token for the `/admin/rewriter` routes; without it they are
    /// disabled.
    #[arg(long, env = ADMIN_TOKEN_ENV, hide_env_values = true)]
    pub admin_token: Option<String>,

    #[arg(long, env = RULES_FOLDER_ID_ENV)]
    pub rules_folder_id: Option<String>,

    #[arg(long, env = RULES_TABLE_ITEM_ID_ENV)]
    pub rules_table_item_id: Option<String>,

    #[arg(long, env = REMOVE_TRAILING_SLASH_ENV)]
    pub remove_trailing_slash: Option<String>,

    #[arg(long, env = LOG_REWRITES_ENV)]
    pub log_rewrites: Option<String>,

    #[arg(long, env = ENABLED_ENV)]
    pub enabled: Option<String>,

    #[arg(long, env = CORE_DATABASE_ENV, default_value = DEFAULT_CORE_DATABASE)]
    pub core_database: String,

    #[arg(long, env = IGNORE_FOR_SITES_ENV, default_value = DEFAULT_IGNORE_FOR_SITES)]
    pub ignore_for_sites: String,

    #[arg(
        long,
        env = IGNORED_PATH_PREFIXES_ENV,
        value_delimiter = ',',
        default_values = DEFAULT_IGNORED_PATH_PREFIXES
    )]
    pub ignored_path_prefixes: Vec<String>,
}

impl CLI {
    /// Builds the rewriter settings, reporting missing or malformed values.
    pub fn settings(&self) -> Result<RewriterSettings, ConfigurationError> {
        let rules_folder_id = self
            .rules_folder_id
            .as_deref()
            .ok_or(ConfigurationError::MissingSetting("RulesFolderId"))
            .and_then(|value| item_id("RulesFolderId", value))?;

        let remove_trailing_slash = self
            .remove_trailing_slash
            .as_deref()
            .ok_or(ConfigurationError::MissingSetting("RemoveTrailingSlash"))
            .and_then(|value| parse_bool("RemoveTrailingSlash", value))?;

        let rules_table_item_id = self
            .rules_table_item_id
            .as_deref()
            .map(|value| item_id("RulesTableItemId", value))
            .transpose()?;

        let mut settings = RewriterSettings::builder()
            .rules_folder_id(rules_folder_id)
            .remove_trailing_slash(remove_trailing_slash)
            .log_rewrites(optional_bool("LogRewrites", self.log_rewrites.as_deref())?)
            .enabled(optional_bool("Enabled", self.enabled.as_deref())?)
            .core_database(self.core_database.clone())
            .ignore_for_sites(parse_sites(&self.ignore_for_sites))
            .ignored_path_prefixes(self.ignored_path_prefixes.clone())
            .build();
        settings.rules_table_item_id = rules_table_item_id;

        Ok(settings)
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        let config = TelemetryConfig::builder()
            .service_name(SERVICE_NAME)
            .json(self.json_logs)
            .build();

        TelemetryConfig {
            otlp_endpoint: self.otlp_endpoint.clone(),
            ..config
        }
    }

    pub fn stream_config(&self) -> RedisStreamConfig {
        RedisStreamConfig::builder()
            .stream_key(self.invalidation_stream.clone())
            .poll_interval(Duration::from_millis(self.invalidation_poll_ms))
            .build()
    }
}

fn item_id(name: &'static str, value: &str) -> Result<ItemId, ConfigurationError> {
    ItemId::new(value).map_err(|_| ConfigurationError::InvalidSetting {
        name,
        value: value.to_string(),
        expected: "an item id",
    })
}

fn optional_bool(name: &'static str, value: Option<&str>) -> Result<bool, ConfigurationError> {
    value.map_or(Ok(false), |value| parse_bool(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CLI {
        CLI::try_parse_from(std::iter::once("gateway").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn builds_settings_with_defaults() {
        let cli = parse(&["--rules-folder-id", "rules", "--remove-trailing-slash", "True"]);
        let settings = cli.settings().unwrap();

        assert_eq!(settings.rules_folder_id.as_str(), "rules");
        assert!(settings.remove_trailing_slash);
        assert!(!settings.enabled);
        assert!(!settings.log_rewrites);
        assert_eq!(settings.core_database, "core");
        assert_eq!(settings.ignore_for_sites, vec!["shell", "login"]);
        assert_eq!(settings.ignored_path_prefixes, vec!["/mvc/", "/~/media/"]);
        assert!(settings.rules_table_item_id.is_none());
    }

    #[test]
    fn builds_settings_from_all_options() {
        let cli = parse(&[
            "--rules-folder-id",
            "rules",
            "--rules-table-item-id",
            "table",
            "--remove-trailing-slash",
            "false",
            "--enabled",
            "true",
            "--log-rewrites",
            "true",
            "--ignore-for-sites",
            "Shell,,Admin",
            "--ignored-path-prefixes",
            "/api/,/static/",
        ]);
        let settings = cli.settings().unwrap();

        assert_eq!(settings.rules_table_item_id.map(String::from).as_deref(), Some("table"));
        assert!(settings.enabled);
        assert!(settings.log_rewrites);
        assert_eq!(settings.ignore_for_sites, vec!["shell", "admin"]);
        assert_eq!(settings.ignored_path_prefixes, vec!["/api/", "/static/"]);
    }

    #[test]
    fn missing_required_settings_are_reported() {
        let err = parse(&["--remove-trailing-slash", "true"]).settings().unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingSetting("RulesFolderId")));

        let err = parse(&["--rules-folder-id", "rules"]).settings().unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingSetting("RemoveTrailingSlash")));
    }

    #[test]
    fn invalid_boolean_is_reported() {
        let err = parse(&["--rules-folder-id", "rules", "--remove-trailing-slash", "yes"])
            .settings()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidSetting { name: "RemoveTrailingSlash", .. }
        ));
    }

    #[test]
    fn mysql_backend_requires_dsn() {
        let result = CLI::try_parse_from(["gateway", "--storage", "mysql"]);
        assert!(result.is_err());
    }

    #[test]
    fn admin_token_is_optional() {
        let cli = parse(&["--rules-folder-id", "rules"]);
        assert!(cli.admin_token.is_none());

        let cli = parse(&["--admin-token", "s3cret"]);
        assert_eq!(cli.admin_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn repeated_sites_are_collected() {
        let cli = parse(&["--site", "shell=admin.x.com@core", "--site", "login=login.x.com@web"]);
        assert_eq!(cli.sites.len(), 2);
    }
}
