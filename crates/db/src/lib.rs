//! MongoDB client factory.
//!
//! The client is created once at process start, shared by every request
//! (the driver pools connections internally) and shut down once at exit.

use std::time::Duration;

use anyhow::Context;
use mongodb::{bson::doc, options::ClientOptions, Client, Collection};

use bookshelf_kernel::settings::DatabaseSettings;

const APP_NAME: &str = "bookshelf";

/// Handle to the configured database and collection.
#[derive(Clone, Debug)]
pub struct Database {
    client: Client,
    database: mongodb::Database,
    collection: String,
}

impl Database {
    /// Connect to the store and verify it answers a `ping`.
    ///
    /// Fails without retrying; callers treat the error as fatal.
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(&settings.uri)
            .await
            .context("failed to parse document store connection string")?;

        let timeout = Duration::from_millis(settings.connect_timeout_ms);
        options.app_name = Some(APP_NAME.to_string());
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let client =
            Client::with_options(options).context("failed to build document store client")?;
        let database = client.database(&settings.name);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .with_context(|| format!("document store did not answer ping on '{}'", settings.name))?;

        tracing::info!(
            target: "bookshelf-db",
            database = %settings.name,
            collection = %settings.collection,
            "connected to document store"
        );

        Ok(Self {
            client,
            database,
            collection: settings.collection.clone(),
        })
    }

    /// Typed handle to the configured collection.
    pub fn collection<T: Send + Sync>(&self) -> Collection<T> {
        self.database.collection(&self.collection)
    }

    /// Release the connection pool.
    pub async fn close(self) {
        self.client.shutdown().await;
        tracing::info!(target: "bookshelf-db", "document store connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_malformed_uri() {
        let settings = DatabaseSettings {
            uri: "not-a-connection-string".to_string(),
            ..DatabaseSettings::default()
        };

        let err = Database::connect(&settings).await.unwrap_err();
        assert!(err
            .to_string()
            .contains("failed to parse document store connection string"));
    }
}
