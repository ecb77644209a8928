use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use quill_common::upload::effective_mime_type;
use quill_common::{SaveRequest, SaveResponse, UploadRejection, UploadResponse, validate_image};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ServerError;
use crate::posts::Post;
use crate::state::AppState;

/// Room for multipart framing on top of the file itself, so a file just over
/// the limit reaches validation instead of being cut off by the body limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

const IMAGE_FIELD: &str = "image";
const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000";

pub fn router(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/blog/new", post(new_post))
        .route("/blog/{id}", get(get_post))
        .route("/blog/{id}/edit", post(edit_post))
        .route(
            "/api/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(upload_limit + MULTIPART_OVERHEAD)),
        )
        .route("/api/images/{name}", get(get_image))
}

#[derive(Serialize)]
struct CreatedPost {
    id: i64,
}

async fn new_post(State(state): State<AppState>) -> Json<CreatedPost> {
    let post = state.posts().create_draft(Utc::now());
    Json(CreatedPost { id: post.id })
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ServerError> {
    state
        .posts()
        .get(id)
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("post {id}")))
}

async fn edit_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SaveRequest>,
) -> Result<Json<SaveResponse>, ServerError> {
    debug!(id, intent = %request.intent, "save request");
    let response = state.posts().apply(id, request, Utc::now())?;
    Ok(Json(response))
}

async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let declared = field.content_type().unwrap_or_default().to_string();
        let data = field.bytes().await?;

        let content_type = effective_mime_type(&declared, &data);
        validate_image(&content_type, data.len())?;
        if data.len() > state.cfg().upload_limit() {
            return Err(UploadRejection::TooLarge { size: data.len() }.into());
        }

        let name = state
            .images()
            .put(&file_name, &content_type, data, Utc::now())
            .await?;
        info!(original = %file_name, %name, "image uploaded");
        return Ok(Json(UploadResponse {
            success: true,
            url: format!("/api/images/{name}"),
            file_name: name,
        }));
    }

    Err(UploadRejection::Missing.into())
}

async fn get_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ServerError> {
    let image = state
        .images()
        .get(&name)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("image {name}")))?;

    Ok((
        [
            (CONTENT_TYPE, image.content_type),
            (CACHE_CONTROL, IMAGE_CACHE_CONTROL.to_string()),
        ],
        image.data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use quill_common::{Intent, MAX_UPLOAD_BYTES};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;

    const BOUNDARY: &str = "quill-test-boundary";

    fn app(dir: &std::path::Path) -> Router {
        let mut cfg = Config::default();
        cfg.storage.image_dir = dir.to_path_buf();
        crate::router(cfg)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json_post(uri: &str, body: &impl Serialize) -> Request<Body> {
        Request::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn multipart(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/api/upload-image")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn create_post(app: &Router) -> i64 {
        let request = Request::post("/blog/new").body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
        created["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_draft_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let id = create_post(&app).await;

        let autosave = SaveRequest::new(Intent::Autosave)
            .with_title("Hello World")
            .with_body("Some words");
        let (status, body) = send(&app, json_post(&format!("/blog/{id}/edit"), &autosave)).await;
        assert_eq!(status, StatusCode::OK);
        let response: SaveResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(response, SaveResponse::ok("Changes Saved"));

        let publish = SaveRequest::new(Intent::Publish);
        let (_, body) = send(&app, json_post(&format!("/blog/{id}/edit"), &publish)).await;
        let response: SaveResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(response.message.as_deref(), Some("Post published"));

        let request = Request::get(format!("/blog/{id}")).body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let post: Post = serde_json::from_slice(&body).unwrap();
        assert_eq!(post.slug, "hello-world");
        assert!(post.is_published());

        // Published posts refuse autosave but still answer 200.
        let (status, body) = send(&app, json_post(&format!("/blog/{id}/edit"), &autosave)).await;
        assert_eq!(status, StatusCode::OK);
        let response: SaveResponse = serde_json::from_slice(&body).unwrap();
        assert!(!response.success);
    }

    #[tokio::test]
    async fn test_unknown_post_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let request = Request::get("/blog/41").body(Body::empty()).unwrap();
        assert_eq!(send(&app, request).await.0, StatusCode::NOT_FOUND);

        let save = SaveRequest::new(Intent::Save).with_body("x");
        let (status, body) = send(&app, json_post("/blog/41/edit", &save)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let response: SaveResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(response.error.as_deref(), Some("post 41 not found"));
    }

    #[tokio::test]
    async fn test_upload_and_serve_image() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, body) = send(&app, multipart("image", "cat.png", "image/png", b"\x89PNG....")).await;
        assert_eq!(status, StatusCode::OK);
        let uploaded: UploadResponse = serde_json::from_slice(&body).unwrap();
        assert!(uploaded.success);
        assert!(uploaded.file_name.ends_with(".png"));
        assert_eq!(uploaded.url, format!("/api/images/{}", uploaded.file_name));

        let response = app
            .clone()
            .oneshot(Request::get(&uploaded.url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[CACHE_CONTROL], IMAGE_CACHE_CONTROL);
        let data = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&data[..], b"\x89PNG....");
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, _) = send(&app, multipart("image", "a.svg", "image/svg+xml", b"<svg/>")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, multipart("file", "a.png", "image/png", b"png")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let big = vec![0u8; MAX_UPLOAD_BYTES + 1];
        let (status, body) = send(&app, multipart("image", "big.jpg", "image/jpeg", &big)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let response: SaveResponse = serde_json::from_slice(&body).unwrap();
        assert!(response.error.unwrap().contains("too large"));

        assert_eq!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
    }

    #[tokio::test]
    async fn test_missing_image_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let request = Request::get("/api/images/nope.png").body(Body::empty()).unwrap();
        assert_eq!(send(&app, request).await.0, StatusCode::NOT_FOUND);
    }
}
