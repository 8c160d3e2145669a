//! Key/value site settings. Public keys are readable by the storefront
//! without authentication.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: serde_json::Value,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public settings as the storefront consumes them: `{key: value}`.
pub fn public_map(settings: Vec<Setting>) -> HashMap<String, serde_json::Value> {
    settings
        .into_iter()
        .filter(|s| s.is_public)
        .map(|s| (s.key, s.value))
        .collect()
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SettingEntry {
    #[validate(regex(
        path = *SETTING_KEY_REGEX,
        message = "Setting keys are 1-64 characters of a-z, 0-9, '_' or '.'"
    ))]
    pub key: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertSettingsRequest {
    #[validate(length(min = 1, max = 100, message = "Provide 1-100 settings"), nested)]
    pub settings: Vec<SettingEntry>,
}

static SETTING_KEY_REGEX: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(r"^[a-z0-9_.]{1,64}$").expect("valid setting key regex")
});
