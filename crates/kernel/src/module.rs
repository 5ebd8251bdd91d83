use async_trait::async_trait;
use axum::Router;

/// Read-only view of process state handed to modules at startup.
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
}

/// A unit of HTTP surface with its own startup and shutdown hooks.
///
/// Dependencies such as the store handle are passed to the module's
/// constructor; the registry only drives the lifecycle.
#[async_trait]
pub trait Module: Sync + Send {
    /// Mount segment, so `books` serves `/books/...`.
    fn name(&self) -> &'static str;

    /// Runs once before the listener binds. An error aborts startup.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes relative to `/{name}`, with their state already attached.
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI 3.1 fragment with `paths` relative to `/{name}` and any
    /// `components.schemas` the paths reference.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Runs once after the listener has drained.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
