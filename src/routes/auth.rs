use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::post,
};

use crate::{
    dto::auth::{
        LoginRequest, LoginResponse, RecoverRequest, RegisterRequest, ResetPasswordRequest,
        ResetQuery,
    },
    dto::users::UserDto,
    error::AppResult,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/recover", post(recover))
        .route("/reset", post(reset))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created together with an empty cart and favorites list", body = ApiResponse<UserDto>),
        (status = 400, description = "Field validation failed"),
        (status = 409, description = "Username or email taken, or a role was supplied"),
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserDto>>)> {
    let resp = auth_service::register_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login user", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials or locked account"),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = auth_service::login_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/recover",
    request_body = RecoverRequest,
    responses(
        (status = 200, description = "Same response whether or not the address exists", body = ApiResponse<serde_json::Value>),
    ),
    tag = "Auth"
)]
pub async fn recover(
    State(state): State<AppState>,
    Json(payload): Json<RecoverRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::request_password_reset(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/reset",
    params(
        ("token" = String, Query, description = "Reset token from the recovery email")
    ),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Password out of bounds"),
        (status = 401, description = "Token invalid, expired, or already used"),
    ),
    tag = "Auth"
)]
pub async fn reset(
    State(state): State<AppState>,
    Query(query): Query<ResetQuery>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::reset_password(&state, &query.token, payload).await?;
    Ok(Json(resp))
}
