use async_trait::async_trait;

use crate::{
    error::StoreError,
    models::{Link, NewClick, NewLink},
};

/// Link persistence used by the allocator, the redirect path and the
/// availability monitor.
///
/// Implementations must reject a second link with an existing short code
/// with [`StoreError::Duplicate`]. The allocator's lookup is only a fast path;
/// the insert is the real uniqueness guard.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn create_link(&self, link: NewLink) -> Result<Link, StoreError>;

    /// Returns [`StoreError::NotFound`] when no link carries `short_code`.
    async fn find_by_code(&self, short_code: &str) -> Result<Link, StoreError>;

    /// Every link, oldest first.
    async fn list_links(&self) -> Result<Vec<Link>, StoreError>;

    async fn count_clicks(&self, link_id: i64) -> Result<i64, StoreError>;
}

/// Click persistence used by the worker pool.
#[async_trait]
pub trait ClickStore: Send + Sync {
    async fn create_click(&self, click: &NewClick) -> Result<(), StoreError>;
}
