use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod api;
pub mod redirect;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/links", post(api::create_link))
        .route("/links/:code/stats", get(api::link_stats));

    Router::new()
        .route("/health", get(api::health))
        .nest("/api/v1", api_router)
        // Short-link redirect — must come LAST so /api/* and /health take priority
        .route("/:code", get(redirect::redirect))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use axum::{body::to_bytes, response::Response};
    use chrono::Utc;

    use super::*;
    use crate::{
        cache::LinkCache,
        config::AppConfig,
        db::{tests::memory_store, SqliteStore},
        models::NewClick,
        queue::{click_queue, ClickReceiver},
        shortcode::LinkAllocator,
        store::{ClickStore, LinkStore},
    };

    /// Handles a test keeps on the pieces behind the router.
    pub(crate) struct Harness {
        pub store: Arc<SqliteStore>,
        pub clicks: ClickReceiver,
        pub cache: LinkCache,
    }

    impl Harness {
        pub async fn record_clicks(&self, code: &str, n: usize) {
            let link = self.store.find_by_code(code).await.unwrap();
            for _ in 0..n {
                self.store
                    .create_click(&NewClick {
                        link_id: link.id,
                        clicked_at: Utc::now().naive_utc(),
                        user_agent: None,
                        ip_address: None,
                    })
                    .await
                    .unwrap();
            }
        }
    }

    pub(crate) async fn test_app(queue_capacity: usize) -> (Router, Harness) {
        let store = Arc::new(memory_store().await);
        let (queue, receiver) = click_queue(queue_capacity);
        let cache = LinkCache::new();

        let state = Arc::new(AppState {
            store: store.clone(),
            allocator: LinkAllocator::new(store.clone()),
            cache: cache.clone(),
            clicks: queue,
            config: AppConfig {
                database_url: "sqlite::memory:".into(),
                host: "127.0.0.1".into(),
                port: 0,
                base_url: "http://short.test".into(),
                click_buffer_size: queue_capacity,
                click_worker_count: 1,
                monitor_interval: Duration::from_secs(300),
                shutdown_grace: Duration::from_secs(1),
            },
        });

        let harness = Harness {
            store,
            clicks: receiver,
            cache,
        };
        (router(state), harness)
    }

    pub(crate) async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
