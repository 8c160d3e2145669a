//! In-memory response caches (`moka`).
//!
//! - WordPress content: 5-minute TTL, cleared by the WooCommerce webhook and
//!   the admin "clear cache" action.
//! - Dashboard stats: short TTL, dropped on any write that moves a count.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rxdesk_db::repository::dashboard::DashboardStats;
use rxdesk_integrations::wordpress::{Post, PostPage};

const CONTENT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum ContentKey {
    Posts { page: u32, per_page: u32 },
    Post(i64),
}

#[derive(Debug, Clone)]
pub enum ContentValue {
    Posts(PostPage),
    Post(Box<Post>),
}

#[derive(Clone)]
pub struct Caches {
    pub content: Cache<ContentKey, ContentValue>,
    dashboard: Cache<(), Arc<DashboardStats>>,
}

impl Caches {
    pub fn new(dashboard_ttl_secs: u64) -> Self {
        Self {
            content: Cache::builder()
                .max_capacity(500)
                .time_to_live(CONTENT_TTL)
                .build(),
            dashboard: Cache::builder()
                .max_capacity(1)
                .time_to_live(Duration::from_secs(dashboard_ttl_secs.max(1)))
                .build(),
        }
    }

    pub async fn dashboard(&self) -> Option<Arc<DashboardStats>> {
        self.dashboard.get(&()).await
    }

    pub async fn store_dashboard(&self, stats: Arc<DashboardStats>) {
        self.dashboard.insert((), stats).await;
    }

    pub async fn invalidate_dashboard(&self) {
        self.dashboard.invalidate(&()).await;
    }

    /// Drop every cached WordPress response.
    pub async fn clear_content(&self) {
        self.content.invalidate_all();
        self.content.run_pending_tasks().await;
    }
}
