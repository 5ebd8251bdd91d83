use std::sync::Arc;

use anyhow::Context;
use bookshelf::books::store::{MemoryBookStore, MongoBookStore, SharedBookStore};
use bookshelf::modules;
use bookshelf_db::Database;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;

    bookshelf_telemetry::init(&settings.telemetry).context("failed to initialize telemetry")?;

    tracing::info!(
        env = ?settings.environment,
        database = %settings.database.name,
        collection = %settings.database.collection,
        "bookshelf bootstrap starting"
    );

    let (store, database): (SharedBookStore, Option<Database>) =
        if settings.database.uses_memory_store() {
            tracing::warn!("using in-memory book store; data is lost on exit");
            (Arc::new(MemoryBookStore::new()), None)
        } else {
            let database = Database::connect(&settings.database)
                .await
                .inspect_err(|err| tracing::error!(error = ?err, "document store unavailable"))
                .context("failed to connect to document store")?;
            (Arc::new(MongoBookStore::new(&database)), Some(database))
        };

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, store);

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_all(&ctx).await?;

    tracing::info!("bookshelf bootstrap complete");

    let served =
        bookshelf_http::start_server(&registry, &settings, bookshelf_http::shutdown_signal()).await;

    registry.stop_all().await?;
    if let Some(database) = database {
        database.close().await;
    }

    served
}
