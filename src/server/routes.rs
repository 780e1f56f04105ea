use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{AppendHeaders, IntoResponse, Response},
    Extension, Json,
};
use coursenotes_core::api::CSRF_HEADER;
use coursenotes_core::{EntityId, Patch};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::store::StoreError;
use super::AppState;

pub const ACCESS_COOKIE: &str = "access_token_cookie";
pub const CSRF_COOKIE: &str = "csrf_access_token";

/// Signed-in user, added to request extensions by [`auth_middleware`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: EntityId,
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            StoreError::Forbidden => StatusCode::FORBIDDEN,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
            StoreError::Invalid(fields) => {
                let mut body = Map::new();
                for (field, message) in fields {
                    if let Value::Array(messages) = body
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()))
                    {
                        messages.push(Value::from(message.as_str()));
                    }
                }
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(Value::Object(body)))
                    .into_response();
            }
        };
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then_some(value)
        })
}

/// Resolves the session cookie and checks the CSRF header on mutating requests.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = cookie(request.headers(), ACCESS_COOKIE) else {
        return StoreError::Unauthorized("Missing access token").into_response();
    };
    let Some(session) = state.lock().session(token).cloned() else {
        return StoreError::Unauthorized("Session expired").into_response();
    };

    if *request.method() != Method::GET {
        let csrf = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok());
        if csrf != Some(session.csrf_token.as_str()) {
            tracing::debug!(method = %request.method(), uri = %request.uri(), "CSRF check failed");
            return StoreError::Unauthorized("Missing or invalid CSRF token").into_response();
        }
    }

    request.extensions_mut().insert(AuthUser {
        id: session.user_id,
    });
    next.run(request).await
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Response {
    let result = state.lock().login(&body.username, &body.password);
    match result {
        Ok((profile, session)) => {
            tracing::info!(user = %profile.username, "user logged in");
            let cookies = AppendHeaders([
                (
                    header::SET_COOKIE,
                    format!(
                        "{}={}; Path=/; HttpOnly; SameSite=Lax",
                        ACCESS_COOKIE, session.access_token
                    ),
                ),
                (
                    header::SET_COOKIE,
                    format!("{}={}; Path=/; SameSite=Lax", CSRF_COOKIE, session.csrf_token),
                ),
            ]);
            (cookies, Json(profile)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<EntityId>,
) -> Response {
    match state.lock().profile(user.id, id) {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<EntityId>,
    Json(patch): Json<Patch>,
) -> Response {
    match state.lock().update_profile(user.id, id, &patch) {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<EntityId>,
) -> Response {
    no_content(state.lock().delete_profile(user.id, id))
}

pub async fn courses(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    let courses = state.lock().courses(user.id);
    Json(json!({ "courses": courses })).into_response()
}

pub async fn create_course(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<Patch>,
) -> Response {
    let result = state.lock().create_course(user.id, &payload);
    created("Created successfully", "course", result)
}

pub async fn update_course(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<EntityId>,
    Json(patch): Json<Patch>,
) -> Response {
    match state.lock().update_course(user.id, course_id, &patch) {
        Ok(course) => Json(course).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_course(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<EntityId>,
) -> Response {
    no_content(state.lock().delete_course(user.id, course_id))
}

pub async fn create_topic(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<EntityId>,
    Json(payload): Json<Patch>,
) -> Response {
    let result = state.lock().create_topic(user.id, course_id, &payload);
    created("Created successfully", "topic", result)
}

pub async fn update_topic(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((course_id, topic_id)): Path<(EntityId, EntityId)>,
    Json(patch): Json<Patch>,
) -> Response {
    match state.lock().update_topic(user.id, course_id, topic_id, &patch) {
        Ok(topic) => Json(topic).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_topic(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((course_id, topic_id)): Path<(EntityId, EntityId)>,
) -> Response {
    no_content(state.lock().delete_topic(user.id, course_id, topic_id))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((course_id, topic_id)): Path<(EntityId, EntityId)>,
    Json(payload): Json<Patch>,
) -> Response {
    let result = state
        .lock()
        .create_note(user.id, course_id, topic_id, &payload);
    created("Note created successfully", "note", result)
}

pub async fn update_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(address): Path<(EntityId, EntityId, EntityId)>,
    Json(patch): Json<Patch>,
) -> Response {
    match state.lock().update_note(user.id, address, &patch) {
        Ok(note) => Json(note).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(address): Path<(EntityId, EntityId, EntityId)>,
) -> Response {
    no_content(state.lock().delete_note(user.id, address))
}

fn created<T: Serialize>(message: &str, key: &str, result: Result<T, StoreError>) -> Response {
    match result {
        Ok(entity) => {
            let mut body = Map::new();
            body.insert("message".to_string(), Value::from(message));
            match serde_json::to_value(entity) {
                Ok(value) => {
                    body.insert(key.to_string(), value);
                }
                Err(e) => {
                    tracing::error!("failed to encode created {}: {}", key, e);
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
            Json(Value::Object(body)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

fn no_content(result: Result<(), StoreError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
