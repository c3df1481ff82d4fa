use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pantry::cli;
use pantry::combine::{CombineStrategy, NaiveSeparateInsert, WithFallback};
use pantry::config::PantryConfig;
use pantry::llm_client::OpenAiClient;
use pantry::localization::LocalizationManager;
use pantry::pantry_service::PantryService;
use pantry::pg_store::PostgresInventoryStore;
use pantry::store::{InMemoryStore, InventoryStore};
use pantry::unit_taxonomy::UnitTable;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = env::var("PANTRY_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Logs go to stderr, stdout belongs to the conversation
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn open_store(config: &PantryConfig) -> Result<Arc<dyn InventoryStore>> {
    match &config.database_url {
        Some(url) => {
            info!(owner = %config.owner_id, "Using Postgres inventory store");
            let store = PostgresInventoryStore::connect(url, &config.owner_id)
                .await
                .context("Failed to open inventory database")?;
            Ok(Arc::new(store))
        }
        None => {
            info!("DATABASE_URL not set, using in-memory inventory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

fn combine_strategy(config: &PantryConfig) -> Result<Box<dyn CombineStrategy>> {
    match &config.ai {
        Some(ai) => {
            let timeout = Duration::from_secs(config.recovery.operation_timeout_secs);
            let client = OpenAiClient::new(ai, timeout)?;
            info!(model = %ai.model, "AI-assisted combine enabled");
            Ok(Box::new(WithFallback::ai_or_separate(client, config.recovery.clone())))
        }
        None => {
            info!("OPENAI_API_KEY not set, batches with duplicates are kept separate");
            Ok(Box::new(NaiveSeparateInsert))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    info!("Starting pantry");
    let config = PantryConfig::from_env()?;

    let store = open_store(&config).await?;
    let strategy = combine_strategy(&config)?;
    let l10n = Arc::new(LocalizationManager::new(&config.language)?);

    let mut service = PantryService::new(store, UnitTable::standard(), strategy);
    service.load().await.context("Failed to load inventory")?;

    let lines = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    cli::run(&mut service, lines, l10n).await?;

    info!("Pantry closed");
    Ok(())
}
