//! WordPress and WooCommerce REST clients.
//!
//! Credentials live in the database and can change at runtime, so a client
//! is cheap to build per request from the current settings and a shared
//! `reqwest::Client`.

use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use rxdesk_common::models::catalog::Product;
use rxdesk_common::models::wordpress::WordPressSettings;

use crate::error::IntegrationError;

const WP_SERVICE: &str = "wordpress";
const WC_SERVICE: &str = "woocommerce";

/// A `{ "rendered": "<p>...</p>" }` field as WordPress returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rendered {
    pub rendered: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub date: String,
    pub modified: Option<String>,
    pub slug: String,
    pub link: String,
    pub title: Rendered,
    pub excerpt: Rendered,
    pub content: Rendered,
    #[serde(default)]
    pub featured_media: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub total: i64,
    pub total_pages: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WpUser {
    pub id: i64,
    pub name: String,
}

/// Product body for `wc/v3/products`. WooCommerce wants prices as strings.
#[derive(Debug, Clone, Serialize)]
pub struct WcProductPayload {
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub product_type: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub regular_price: String,
    pub sale_price: String,
    pub description: String,
    pub manage_stock: bool,
    pub stock_quantity: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<WcImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WcImage {
    pub src: String,
}

impl WcProductPayload {
    /// Build the push payload for a local product. `public_url` resolves
    /// relative image paths.
    pub fn from_product(product: &Product, public_url: &str) -> Self {
        let images = product
            .image_url
            .as_deref()
            .map(|src| {
                if src.starts_with("http://") || src.starts_with("https://") {
                    src.to_string()
                } else {
                    format!("{}{src}", public_url.trim_end_matches('/'))
                }
            })
            .map(|src| vec![WcImage { src }])
            .unwrap_or_default();

        Self {
            name: product.name.clone(),
            slug: product.slug.clone(),
            product_type: "simple",
            status: if product.is_active { "publish" } else { "draft" },
            sku: product.sku.clone(),
            regular_price: money(product.price),
            sale_price: product.sale_price.map(money).unwrap_or_default(),
            description: product.description.clone().unwrap_or_default(),
            manage_stock: true,
            stock_quantity: product.stock_quantity,
            images,
        }
    }
}

fn money(d: Decimal) -> String {
    let mut d = d.round_dp(2);
    d.rescale(2);
    d.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WcProduct {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct WpErrorBody {
    message: Option<String>,
}

/// Client for one WordPress site, authenticated with an application password
/// (WordPress) and consumer key/secret (WooCommerce).
pub struct WordPressClient {
    http: Client,
    base: Url,
    username: String,
    app_password: String,
    wc_key: String,
    wc_secret: String,
}

impl WordPressClient {
    pub fn from_settings(http: Client, settings: &WordPressSettings) -> Result<Self, IntegrationError> {
        if !settings.is_configured() {
            return Err(IntegrationError::NotConfigured("WordPress"));
        }
        let base = Url::parse(&format!("{}/", settings.site_url.trim_end_matches('/'))).map_err(|e| {
            IntegrationError::BadUrl {
                service: WP_SERVICE,
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            http,
            base,
            username: settings.username.clone(),
            app_password: settings.app_password.clone(),
            wc_key: settings.wc_consumer_key.clone(),
            wc_secret: settings.wc_consumer_secret.clone(),
        })
    }

    fn endpoint(&self, service: &'static str, path: &str) -> Result<Url, IntegrationError> {
        self.base.join(path).map_err(|e| IntegrationError::BadUrl {
            service,
            message: e.to_string(),
        })
    }

    fn wp(&self, request: RequestBuilder) -> RequestBuilder {
        if self.username.is_empty() {
            request
        } else {
            request.basic_auth(&self.username, Some(&self.app_password))
        }
    }

    fn wc(&self, request: RequestBuilder) -> Result<RequestBuilder, IntegrationError> {
        if self.wc_key.is_empty() || self.wc_secret.is_empty() {
            return Err(IntegrationError::NotConfigured("WooCommerce"));
        }
        Ok(request.basic_auth(&self.wc_key, Some(&self.wc_secret)))
    }

    // ── WordPress ────────────────────────────────────────────────────────────

    /// `GET wp-json/wp/v2/posts?page=&per_page=`
    #[instrument(skip(self))]
    pub async fn list_posts(&self, page: u32, per_page: u32) -> Result<PostPage, IntegrationError> {
        let url = self.endpoint(WP_SERVICE, "wp-json/wp/v2/posts")?;
        let response = self
            .http
            .get(url)
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await
            .map_err(|e| IntegrationError::http(WP_SERVICE, e))?;
        let response = check(WP_SERVICE, response).await?;

        let total = header_i64(&response, "X-WP-Total");
        let total_pages = header_i64(&response, "X-WP-TotalPages");
        let posts: Vec<Post> = decode(WP_SERVICE, response).await?;
        debug!(count = posts.len(), "Fetched WordPress posts");

        Ok(PostPage {
            total: total.unwrap_or(posts.len() as i64),
            total_pages: total_pages.unwrap_or(1),
            posts,
            page,
            per_page,
        })
    }

    /// `GET wp-json/wp/v2/posts/{id}`
    #[instrument(skip(self))]
    pub async fn get_post(&self, id: i64) -> Result<Post, IntegrationError> {
        let url = self.endpoint(WP_SERVICE, &format!("wp-json/wp/v2/posts/{id}"))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| IntegrationError::http(WP_SERVICE, e))?;
        decode(WP_SERVICE, check(WP_SERVICE, response).await?).await
    }

    /// `GET wp-json/wp/v2/users/me`: proves the application password works.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<WpUser, IntegrationError> {
        let url = self.endpoint(WP_SERVICE, "wp-json/wp/v2/users/me")?;
        let response = self
            .wp(self.http.get(url))
            .send()
            .await
            .map_err(|e| IntegrationError::http(WP_SERVICE, e))?;
        decode(WP_SERVICE, check(WP_SERVICE, response).await?).await
    }

    // ── WooCommerce ──────────────────────────────────────────────────────────

    /// `POST wp-json/wc/v3/products`
    #[instrument(skip(self, payload), fields(slug = %payload.slug))]
    pub async fn create_product(&self, payload: &WcProductPayload) -> Result<WcProduct, IntegrationError> {
        let url = self.endpoint(WC_SERVICE, "wp-json/wc/v3/products")?;
        let response = self
            .wc(self.http.post(url))?
            .json(payload)
            .send()
            .await
            .map_err(|e| IntegrationError::http(WC_SERVICE, e))?;
        decode(WC_SERVICE, check(WC_SERVICE, response).await?).await
    }

    /// `PUT wp-json/wc/v3/products/{id}`
    #[instrument(skip(self, payload), fields(slug = %payload.slug))]
    pub async fn update_product(
        &self,
        wc_product_id: i64,
        payload: &WcProductPayload,
    ) -> Result<WcProduct, IntegrationError> {
        let url = self.endpoint(WC_SERVICE, &format!("wp-json/wc/v3/products/{wc_product_id}"))?;
        let response = self
            .wc(self.http.put(url))?
            .json(payload)
            .send()
            .await
            .map_err(|e| IntegrationError::http(WC_SERVICE, e))?;
        decode(WC_SERVICE, check(WC_SERVICE, response).await?).await
    }
}

async fn check(service: &'static str, response: Response) -> Result<Response, IntegrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<WpErrorBody>()
        .await
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
    warn!(service, status = status.as_u16(), "Remote API error: {message}");
    Err(IntegrationError::Api {
        service,
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(service: &'static str, response: Response) -> Result<T, IntegrationError> {
    response
        .json::<T>()
        .await
        .map_err(|e| IntegrationError::decode(service, e))
}

fn header_i64(response: &Response, name: &str) -> Option<i64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
