//! Catalogue routes: categories and products.
//!
//! Reads are public (active products only); writes are staff-only.

use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use rxdesk_common::{
    error::{RxError, RxResult},
    ids,
    models::catalog::{
        Category, CreateCategoryRequest, CreateProductRequest, Product, ProductFilter,
        UpdateCategoryRequest, UpdateProductRequest,
    },
    pagination::{Page, Pagination},
    validation::{slugify, validate_request},
};
use rxdesk_db::{
    postgres::{is_foreign_key_violation, is_unique_violation},
    repository::{
        categories,
        products::{self, NewProduct, ProductChanges},
    },
};
use std::sync::Arc;
use uuid::Uuid;

use super::{with_staff, Ack};
use crate::{
    extract::JsonBody,
    storage::{self, Bucket},
    AppState,
};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/{id}", get(get_category))
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product));

    let staff = Router::new()
        .route("/admin/categories", post(create_category))
        .route(
            "/admin/categories/{id}",
            axum::routing::put(update_category).delete(delete_category),
        )
        .route("/admin/products", get(admin_list_products).post(create_product))
        .route(
            "/admin/products/{id}",
            axum::routing::put(update_product).delete(delete_product),
        )
        .route("/admin/products/{id}/image", post(upload_product_image));

    public.merge(with_staff(&state, staff))
}

/// Translate constraint violations on catalogue writes into client errors.
fn write_error(e: sqlx::Error, resource: &str) -> RxError {
    if is_unique_violation(&e) {
        RxError::AlreadyExists {
            resource: format!("{resource} with this slug or SKU"),
        }
    } else if is_foreign_key_violation(&e) {
        RxError::validation("Category does not exist")
    } else {
        e.into()
    }
}

/// Empty strings from form-style clients mean "not provided".
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ── Categories ────────────────────────────────────────────────────────────────

/// GET /api/categories
async fn list_categories(State(state): State<Arc<AppState>>) -> RxResult<Json<Vec<Category>>> {
    Ok(Json(categories::list_categories(&state.db.pg).await?))
}

/// GET /api/categories/{id}
async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Category>> {
    categories::find_by_id(&state.db.pg, id)
        .await?
        .map(Json)
        .ok_or_else(|| RxError::not_found("Category"))
}

/// POST /api/admin/categories
async fn create_category(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CreateCategoryRequest>,
) -> RxResult<Json<Category>> {
    validate_request(&body)?;

    let slug = non_empty(&body.slug)
        .map(slugify)
        .unwrap_or_else(|| slugify(&body.name));
    if slug.is_empty() {
        return Err(RxError::validation("Name must contain letters or digits"));
    }

    let category = categories::create_category(
        &state.db.pg,
        ids::generate_id(),
        body.name.trim(),
        &slug,
        non_empty(&body.description),
        non_empty(&body.image_url),
    )
    .await
    .map_err(|e| write_error(e, "Category"))?;

    tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
    Ok(Json(category))
}

/// PUT /api/admin/categories/{id}
async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateCategoryRequest>,
) -> RxResult<Json<Category>> {
    validate_request(&body)?;

    let slug = non_empty(&body.slug).map(slugify);
    categories::update_category(
        &state.db.pg,
        id,
        non_empty(&body.name),
        slug.as_deref(),
        body.description.as_deref(),
        body.image_url.as_deref(),
    )
    .await
    .map_err(|e| write_error(e, "Category"))?
    .map(Json)
    .ok_or_else(|| RxError::not_found("Category"))
}

/// DELETE /api/admin/categories/{id}
///
/// Products in the category are kept and become uncategorised.
async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Ack>> {
    if !categories::delete_category(&state.db.pg, id).await? {
        return Err(RxError::not_found("Category"));
    }
    Ok(Json(Ack::ok()))
}

// ── Products ──────────────────────────────────────────────────────────────────

/// GET /api/products: active products only.
async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ProductFilter>,
    Query(pagination): Query<Pagination>,
) -> RxResult<Json<Page<Product>>> {
    let (rows, total) = products::list_products(
        &state.db.pg,
        &filter,
        true,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(Page::new(rows, total, &pagination)))
}

/// GET /api/admin/products: includes inactive products.
async fn admin_list_products(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ProductFilter>,
    Query(pagination): Query<Pagination>,
) -> RxResult<Json<Page<Product>>> {
    let (rows, total) = products::list_products(
        &state.db.pg,
        &filter,
        false,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(Page::new(rows, total, &pagination)))
}

/// GET /api/products/{id}
async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Product>> {
    products::find_by_id(&state.db.pg, id)
        .await?
        .filter(|p| p.is_active)
        .map(Json)
        .ok_or_else(|| RxError::not_found("Product"))
}

/// POST /api/admin/products
async fn create_product(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CreateProductRequest>,
) -> RxResult<Json<Product>> {
    validate_request(&body)?;

    let slug = non_empty(&body.slug)
        .map(slugify)
        .unwrap_or_else(|| slugify(&body.name));
    if slug.is_empty() {
        return Err(RxError::validation("Name must contain letters or digits"));
    }

    let product = products::create_product(
        &state.db.pg,
        ids::generate_id(),
        NewProduct {
            category_id: body.category_id,
            name: body.name.trim(),
            slug: &slug,
            sku: non_empty(&body.sku),
            description: body.description.as_deref(),
            price: body.price,
            sale_price: body.sale_price,
            stock_quantity: body.stock_quantity,
            requires_prescription: body.requires_prescription,
            image_url: non_empty(&body.image_url),
            is_active: body.is_active,
        },
    )
    .await
    .map_err(|e| write_error(e, "Product"))?;

    tracing::info!(product_id = %product.id, "Product created");
    state.dashboard_changed().await;
    Ok(Json(product))
}

/// PUT /api/admin/products/{id}
async fn update_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateProductRequest>,
) -> RxResult<Json<Product>> {
    validate_request(&body)?;

    let slug = non_empty(&body.slug).map(slugify);
    let product = products::update_product(
        &state.db.pg,
        id,
        ProductChanges {
            category_id: body.category_id,
            name: non_empty(&body.name),
            slug: slug.as_deref(),
            sku: non_empty(&body.sku),
            description: body.description.as_deref(),
            price: body.price,
            sale_price: body.sale_price,
            stock_quantity: body.stock_quantity,
            requires_prescription: body.requires_prescription,
            image_url: non_empty(&body.image_url),
            is_active: body.is_active,
        },
    )
    .await
    .map_err(|e| write_error(e, "Product"))?
    .ok_or_else(|| RxError::not_found("Product"))?;

    // Stock level feeds the low-stock panel
    if body.stock_quantity.is_some() || body.is_active.is_some() {
        state.dashboard_changed().await;
    }
    Ok(Json(product))
}

/// DELETE /api/admin/products/{id}
///
/// Past order lines keep their snapshot; cart lines for the product go away.
async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> RxResult<Json<Ack>> {
    let product = products::find_by_id(&state.db.pg, id)
        .await?
        .ok_or_else(|| RxError::not_found("Product"))?;

    products::delete_product(&state.db.pg, id).await?;
    remove_local_image(&state, product.image_url.as_deref()).await;

    tracing::info!(product_id = %id, "Product deleted");
    state.dashboard_changed().await;
    Ok(Json(Ack::ok()))
}

/// POST /api/admin/products/{id}/image (multipart, field `file`)
async fn upload_product_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> RxResult<Json<Product>> {
    let existing = products::find_by_id(&state.db.pg, id)
        .await?
        .ok_or_else(|| RxError::not_found("Product"))?;

    let mut stored = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RxError::validation(format!("Multipart error: {e}")))?
    {
        if matches!(field.name(), Some("file") | Some("image")) {
            let upload = state.storage.read_field(field).await?;
            stored = Some(state.storage.save(Bucket::Public, &upload).await?);
            break;
        }
    }
    let stored = stored.ok_or_else(|| RxError::validation("No file field in request"))?;

    let url = storage::public_url(&state.config.server.public_url, &stored.name);
    let product = match products::set_image(&state.db.pg, id, &url).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            state.storage.delete(&stored.path).await;
            return Err(RxError::not_found("Product"));
        }
        Err(e) => {
            state.storage.delete(&stored.path).await;
            return Err(e.into());
        }
    };

    remove_local_image(&state, existing.image_url.as_deref()).await;
    Ok(Json(product))
}

/// Delete a replaced image if it lives in our public bucket.
async fn remove_local_image(state: &AppState, image_url: Option<&str>) {
    if let Some(path) =
        image_url.and_then(|url| storage::public_path_from_url(&state.config.server.public_url, url))
    {
        state.storage.delete(&path).await;
    }
}
