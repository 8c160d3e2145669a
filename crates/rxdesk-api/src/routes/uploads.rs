//! Staff image uploads for site content (banners, category art).

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use rxdesk_common::error::{RxError, RxResult};
use serde::Serialize;

use super::with_staff;
use crate::{
    storage::{self, Bucket},
    AppState,
};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    with_staff(&state, Router::new().route("/admin/uploads", post(upload)))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    url: String,
    filename: String,
    size: usize,
}

/// POST /api/admin/uploads (multipart, field `file`)
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> RxResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RxError::validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let upload = state.storage.read_field(field).await?;
        let stored = state.storage.save(Bucket::Public, &upload).await?;
        tracing::info!(
            path = %stored.path,
            original = %stored.original_filename,
            size = stored.size,
            "Image uploaded"
        );

        return Ok(Json(UploadResponse {
            url: storage::public_url(&state.config.server.public_url, &stored.name),
            filename: stored.name,
            size: stored.size,
        }));
    }

    Err(RxError::validation("No file field in request"))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{access_token, json_body, send, test_state};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use rxdesk_common::models::user::Role;

    const BOUNDARY: &str = "rxdeskboundary";

    fn multipart(filename: &str, content_type: &str, data: &str) -> Body {
        Body::from(format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: {content_type}\r\n\r\n\
             {data}\r\n\
             --{BOUNDARY}--\r\n"
        ))
    }

    fn upload_request(body: Body) -> Request<Body> {
        Request::post("/api/admin/uploads")
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token(Role::Pharmacist)))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn test_image_upload_returns_public_url() {
        let state = test_state();
        state.storage.ensure_dirs().await.unwrap();
        let router = crate::build_router(state);

        let response = send(router, upload_request(multipart("banner.png", "image/png", "PNGDATA"))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let url = body["url"].as_str().unwrap();
        assert!(url.starts_with("http://localhost:8080/uploads/"));
        assert!(url.ends_with(".png"));
        assert_eq!(body["size"], 7);
    }

    #[tokio::test]
    async fn test_executables_are_rejected() {
        let response = send(
            crate::build_router(test_state()),
            upload_request(multipart("setup.exe", "application/x-msdownload", "MZ")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
