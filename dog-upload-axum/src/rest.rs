use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use dog_upload::{UploadRequest, UploadResponse};

use crate::multipart::{read_upload_request, DISK_FIELD, PATH_FIELD, SESSION_COOKIE, SESSION_HEADER};
use crate::{UploadHttpError, UploadState};

/// Routes for one upload endpoint:
///
/// - `POST /` receives a whole file or one chunk as multipart form data
/// - `GET /` answers the resumable.js test-chunk probe: `200` when the chunk
///   is already stored, `204` when it still has to be sent
///
/// Chunk sessions are scoped per caller by the `x-upload-session` header or,
/// failing that, the `dog_upload_session` cookie, which is issued on first upload.
pub fn upload_router(state: UploadState) -> Router<()> {
    Router::new()
        .route("/", routing::post(upload).get(probe))
        .with_state(state)
}

/// Session token sent by the caller, header first
fn caller_session(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
        .filter(|s| !s.trim().is_empty())
}

async fn upload(
    State(state): State<UploadState>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Body,
) -> Result<(CookieJar, Json<UploadResponse>), UploadHttpError> {
    let (session, jar) = match caller_session(&headers, &jar) {
        Some(session) => (session, jar),
        None => {
            let session = uuid::Uuid::new_v4().simple().to_string();
            let cookie = Cookie::build((SESSION_COOKIE, session.clone()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax);
            tracing::debug!("issued upload session cookie");
            (session, jar.add(cookie))
        }
    };

    let request =
        read_upload_request(&headers, query, body, &session, &state.multipart, &state.disks)
            .await?;
    let response = state.uploader.handle(request, &state.field).await?;
    Ok((jar, Json(response)))
}

async fn probe(
    State(state): State<UploadState>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<StatusCode, UploadHttpError> {
    let disk = query.get(DISK_FIELD).map(String::as_str).filter(|d| !d.is_empty());
    let mut request = UploadRequest::new(state.disks.manager(disk)?)
        .with_file_path(query.get(PATH_FIELD).cloned().unwrap_or_default());

    for (name, value) in &headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }
    if let Some(session) = caller_session(&headers, &jar) {
        request = request.with_session(session);
    }
    for (key, value) in query {
        request = request.with_param(key, value);
    }

    if state.uploader.probe(&request, &state.field).await? {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NO_CONTENT)
    }
}
