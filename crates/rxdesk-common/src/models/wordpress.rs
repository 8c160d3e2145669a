//! WordPress / WooCommerce connection settings (single row).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WordPressSettings {
    pub enabled: bool,
    pub site_url: String,
    pub username: String,
    pub app_password: String,
    pub wc_consumer_key: String,
    pub wc_consumer_secret: String,
    pub webhook_secret: String,
    pub sync_posts: bool,
    pub sync_products: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl WordPressSettings {
    /// Enabled with enough to talk to the WordPress REST API.
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.site_url.trim().is_empty()
    }

    pub fn has_woocommerce_keys(&self) -> bool {
        !self.wc_consumer_key.is_empty() && !self.wc_consumer_secret.is_empty()
    }
}

/// Admin view of the settings; secrets are reduced to "is it set".
#[derive(Debug, Serialize)]
pub struct WordPressSettingsResponse {
    pub enabled: bool,
    pub site_url: String,
    pub username: String,
    pub app_password_set: bool,
    pub wc_consumer_key_set: bool,
    pub wc_consumer_secret_set: bool,
    pub webhook_secret_set: bool,
    pub sync_posts: bool,
    pub sync_products: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<WordPressSettings> for WordPressSettingsResponse {
    fn from(s: WordPressSettings) -> Self {
        Self {
            enabled: s.enabled,
            app_password_set: !s.app_password.is_empty(),
            wc_consumer_key_set: !s.wc_consumer_key.is_empty(),
            wc_consumer_secret_set: !s.wc_consumer_secret.is_empty(),
            webhook_secret_set: !s.webhook_secret.is_empty(),
            site_url: s.site_url,
            username: s.username,
            sync_posts: s.sync_posts,
            sync_products: s.sync_products,
            last_sync_at: s.last_sync_at,
            updated_at: s.updated_at,
        }
    }
}

/// Absent fields keep their stored value; secrets are write-only.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateWordPressSettingsRequest {
    pub enabled: Option<bool>,
    #[validate(url(message = "Site URL must be a valid URL"))]
    pub site_url: Option<String>,
    #[validate(length(max = 128))]
    pub username: Option<String>,
    pub app_password: Option<String>,
    pub wc_consumer_key: Option<String>,
    pub wc_consumer_secret: Option<String>,
    pub webhook_secret: Option<String>,
    pub sync_posts: Option<bool>,
    pub sync_products: Option<bool>,
}

impl UpdateWordPressSettingsRequest {
    /// Merge onto the stored row.
    pub fn apply(self, mut current: WordPressSettings) -> WordPressSettings {
        if let Some(v) = self.enabled {
            current.enabled = v;
        }
        if let Some(v) = self.site_url {
            current.site_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = self.username {
            current.username = v;
        }
        if let Some(v) = self.app_password {
            current.app_password = v;
        }
        if let Some(v) = self.wc_consumer_key {
            current.wc_consumer_key = v;
        }
        if let Some(v) = self.wc_consumer_secret {
            current.wc_consumer_secret = v;
        }
        if let Some(v) = self.webhook_secret {
            current.webhook_secret = v;
        }
        if let Some(v) = self.sync_posts {
            current.sync_posts = v;
        }
        if let Some(v) = self.sync_products {
            current.sync_products = v;
        }
        current
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ProductSyncReport {
    pub created: u32,
    pub updated: u32,
    pub failed: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> WordPressSettings {
        WordPressSettings {
            enabled: true,
            site_url: "https://blog.example.com".into(),
            username: "editor".into(),
            app_password: "abcd efgh".into(),
            wc_consumer_key: "ck_1".into(),
            wc_consumer_secret: String::new(),
            webhook_secret: "whsec".into(),
            sync_posts: true,
            sync_products: false,
            last_sync_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_response_masks_secrets() {
        let json = serde_json::to_value(WordPressSettingsResponse::from(stored())).unwrap();
        assert_eq!(json["app_password_set"], true);
        assert_eq!(json["wc_consumer_secret_set"], false);
        assert!(json.get("app_password").is_none());
        assert!(!json.to_string().contains("abcd efgh"));
    }

    #[test]
    fn test_partial_update_keeps_secrets() {
        let update = UpdateWordPressSettingsRequest {
            site_url: Some("https://new.example.com/".into()),
            sync_products: Some(true),
            ..Default::default()
        };
        let merged = update.apply(stored());
        assert_eq!(merged.site_url, "https://new.example.com");
        assert_eq!(merged.app_password, "abcd efgh");
        assert!(merged.sync_products);
        assert!(merged.is_configured());
        assert!(!merged.has_woocommerce_keys());
    }
}
