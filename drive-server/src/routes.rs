use axum::{
    extract::{DefaultBodyLimit, Multipart, OriginalUri, Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use core_auth::SessionId;
use core_drive::{is_root, StagedUpload, ROOT_FOLDER_ID};
use core_runtime::logging::strip_path;
use core_service::DriveService;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::AppError;
use crate::session::{expired_session_cookie, session_cookie, session_from_headers};

/// Room for multipart boundaries and form fields around the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: DriveService,
}

impl AppState {
    pub fn new(service: DriveService) -> Self {
        Self { service }
    }
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state
        .service
        .config()
        .max_content_length
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(index))
        .route("/login", get(login))
        .route("/oauth2callback", get(oauth_callback))
        .route("/logout", get(logout))
        .route("/dashboard", get(dashboard_root))
        .route("/dashboard/:folder_id", get(dashboard))
        .route("/upload", post(upload))
        .route("/download/:file_id", get(download))
        .route("/delete/:file_id", get(delete))
        .layer(DefaultBodyLimit::max(
            usize::try_from(body_limit).unwrap_or(usize::MAX),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn require_session(headers: &HeaderMap) -> Result<SessionId, AppError> {
    session_from_headers(headers).ok_or(AppError::LoginRequired)
}

fn dashboard_location(folder_id: &str) -> String {
    if is_root(folder_id) {
        "/dashboard".to_string()
    } else {
        format!("/dashboard/{}", folder_id)
    }
}

async fn index(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let auth_state = match session_from_headers(&headers) {
        Some(session_id) => state.service.auth_state(session_id).await?,
        None => Default::default(),
    };
    Ok(Json(json!({
        "authenticated": auth_state.is_authenticated(),
        "state": auth_state,
    }))
    .into_response())
}

async fn login(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let session_id = session_from_headers(&headers).unwrap_or_default();
    let auth_url = state.service.begin_login(session_id).await?;

    Ok((
        [(header::SET_COOKIE, session_cookie(session_id))],
        Redirect::to(&auth_url),
    )
        .into_response())
}

async fn oauth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Redirect, AppError> {
    let session_id = require_session(&headers)?;
    state
        .service
        .complete_login(session_id, &uri.to_string())
        .await?;

    info!(session_id = %session_id, "Signed in");
    Ok(Redirect::to("/dashboard"))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if let Some(session_id) = session_from_headers(&headers) {
        state.service.logout(session_id).await?;
    }
    Ok((
        [(header::SET_COOKIE, expired_session_cookie())],
        Redirect::to("/"),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page_token: Option<String>,
}

async fn dashboard_root(
    state: State<AppState>,
    headers: HeaderMap,
    query: Query<PageQuery>,
) -> Result<Response, AppError> {
    folder_listing(state, headers, ROOT_FOLDER_ID.to_string(), query).await
}

async fn dashboard(
    state: State<AppState>,
    headers: HeaderMap,
    Path(folder_id): Path<String>,
    query: Query<PageQuery>,
) -> Result<Response, AppError> {
    folder_listing(state, headers, folder_id, query).await
}

/// Full folder view, or only the next page when a token is given.
async fn folder_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    folder_id: String,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let session_id = require_session(&headers)?;

    let response = match query.page_token {
        Some(token) => Json(
            state
                .service
                .list_children_page(session_id, &folder_id, Some(token))
                .await?,
        )
        .into_response(),
        None => Json(state.service.folder_view(session_id, &folder_id).await?).into_response(),
    };
    Ok(response)
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let session_id = require_session(&headers)?;
    let mut folder_id = ROOT_FOLDER_ID.to_string();
    let mut staged: Option<StagedUpload> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("folder_id") => {
                let value = field.text().await?;
                if !value.trim().is_empty() {
                    folder_id = value.trim().to_string();
                }
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                if file_name.is_empty() {
                    return Err(AppError::BadRequest("No file selected".to_string()));
                }
                let mut upload = state.service.stage_upload(&file_name)?;
                while let Some(chunk) = field.chunk().await? {
                    upload.write_chunk(&chunk)?;
                }
                staged = Some(upload);
            }
            _ => {}
        }
    }

    let staged = staged.ok_or_else(|| AppError::BadRequest("No file part".to_string()))?;
    info!(
        file = %strip_path(&staged.path().to_string_lossy()),
        bytes = staged.size(),
        "Upload staged"
    );
    state
        .service
        .upload_staged(session_id, staged, &folder_id)
        .await?;

    Ok(Redirect::to(&dashboard_location(&folder_id)))
}

async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let session_id = require_session(&headers)?;
    let file = state.service.download(session_id, &file_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&file.name)),
        ],
        file.content,
    )
        .into_response())
}

async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(file_id): Path<String>,
) -> Result<Redirect, AppError> {
    let session_id = require_session(&headers)?;
    let parent_id = state.service.delete(session_id, &file_id).await?;

    Ok(Redirect::to(&dashboard_location(&parent_id)))
}

/// `attachment` header value; quotes and control characters are dropped
/// from the name so it cannot break out of the quoted string.
fn content_disposition(name: &str) -> String {
    let safe: String = name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}
