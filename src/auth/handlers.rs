use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MeResponse, PublicUser, RefreshRequest, RegisterRequest},
        extract::AuthUser,
        repo::AccountError,
        repo_types::User,
        services::{hash_password, normalize_email, validate_signup, verify_password},
        tokens::TokenKind,
    },
    receipts::services::summarize,
    state::AppState,
};

type Rejection = (StatusCode, String);

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn server_error(what: &str, e: impl std::fmt::Display) -> Rejection {
    error!(error = %e, "{}", what);
    (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
}

fn invalid_credentials() -> Rejection {
    (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
}

fn session_for(state: &AppState, user: User) -> Result<AuthResponse, Rejection> {
    let tokens = state
        .tokens
        .issue_pair(user.id)
        .map_err(|e| server_error("token signing failed", e))?;
    Ok(AuthResponse {
        tokens,
        user: user.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), Rejection> {
    let signup = validate_signup(&payload.name, &payload.email, &payload.password).map_err(|e| {
        warn!(reason = %e, "signup rejected");
        (StatusCode::BAD_REQUEST, e.to_string())
    })?;

    let hash = hash_password(&payload.password).map_err(|e| server_error("hash_password failed", e))?;

    let user = match state.accounts.create(&signup.name, &signup.email, &hash).await {
        Ok(user) => user,
        Err(AccountError::EmailTaken) => {
            warn!(email = %signup.email, "email already registered");
            return Err((StatusCode::CONFLICT, "Email already registered".into()));
        }
        Err(e) => return Err(server_error("create account failed", e)),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(session_for(&state, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, Rejection> {
    let email = normalize_email(&payload.email);

    let user = state
        .accounts
        .find_by_email(&email)
        .await
        .map_err(|e| server_error("find_by_email failed", e))?
        .ok_or_else(|| {
            warn!(%email, "login for unknown email");
            invalid_credentials()
        })?;

    // seeded accounts without a hash can never log in
    let matches = !user.password_hash.is_empty()
        && verify_password(&payload.password, &user.password_hash)
            .map_err(|e| server_error("verify_password failed", e))?;
    if !matches {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(invalid_credentials());
    }

    info!(user_id = %user.id, "user logged in");
    Ok(Json(session_for(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, Rejection> {
    let claims = state
        .tokens
        .verify(&payload.refresh_token, TokenKind::Refresh)
        .map_err(|e| {
            warn!(error = %e, "refresh rejected");
            (StatusCode::UNAUTHORIZED, "Invalid refresh token".to_string())
        })?;

    let user = state
        .accounts
        .find_by_id(claims.sub)
        .await
        .map_err(|e| server_error("find_by_id failed", e))?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    Ok(Json(session_for(&state, user)?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MeResponse>, Rejection> {
    let receipts = state
        .receipts
        .list_for_email(&user.email)
        .await
        .map_err(|e| server_error("list receipts failed", e))?;
    let summary = summarize(receipts);

    Ok(Json(MeResponse {
        user: PublicUser {
            id: user.id,
            name: user.name,
            email: user.email,
        },
        receipt_count: summary.count,
        average_score: summary.average_score,
    }))
}
