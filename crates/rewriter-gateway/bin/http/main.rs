mod cli;
mod seed;

use crate::cli::{StorageBackendArg, CLI};
use clap::Parser;
use rewriter_cache::{
    CacheInvalidator, InMemoryChannel, InvalidationChannel, InvalidationListener,
    RedisStreamChannel, RuleCache,
};
use rewriter_core::ConfigurationError;
use rewriter_engine::{RewritePipeline, SiteMap};
use rewriter_gateway::{App, AppState};
use rewriter_storage::{MySqlRuleSource, RuleLoader};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CLI::try_parse()?;
    let _telemetry = rewriter_telemetry::init(config.telemetry_config())?;

    let settings = config.settings()?;
    let sites = SiteMap::parse(config.sites.iter().map(String::as_str))?;

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        rules_folder_id = %settings.rules_folder_id,
        enabled = settings.enabled,
        "starting rewriter gateway"
    );

    let cache = Arc::new(match config.storage {
        StorageBackendArg::InMemory => {
            let source =
                seed::in_memory_source(&settings.rules_folder_id, config.seed_file.as_deref())?;
            RuleCache::new(RuleLoader::new(source, &settings))
        }
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .ok_or(ConfigurationError::MissingSetting("MysqlDsn"))?;
            let source = MySqlRuleSource::connect(mysql_dsn).await?;
            RuleCache::new(RuleLoader::new(source, &settings))
        }
    });

    let channel: Arc<dyn InvalidationChannel> = match &config.redis_url {
        Some(redis_url) => {
            Arc::new(RedisStreamChannel::connect(redis_url, config.stream_config()).await?)
        }
        None => Arc::new(InMemoryChannel::new()),
    };
    let _listener = InvalidationListener::spawn(Arc::clone(&cache), Arc::clone(&channel)).await?;

    if settings.enabled {
        cache.ensure_loaded().await;
    }

    let pipeline = RewritePipeline::new(settings, Arc::clone(&cache));
    let invalidator = CacheInvalidator::new(cache, channel);
    let mut state = AppState::new(pipeline, invalidator, Arc::new(sites))
        .with_default_scheme(config.default_scheme.clone());
    match &config.admin_token {
        Some(token) => state = state.with_admin_token(token.clone()),
        None => warn!("no admin token configured, administrative endpoints are disabled"),
    }

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(listener, App::router(state)).await?;

    Ok(())
}
