use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
};
use tracing::{error, warn};
use uuid::Uuid;

use super::tokens::TokenKind;
use crate::state::AppState;

/// The account behind a valid access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or((StatusCode::UNAUTHORIZED, "Missing bearer token".to_string()))?;

        let claims = state.tokens.verify(token, TokenKind::Access).map_err(|e| {
            warn!(error = %e, "bearer token rejected");
            (StatusCode::UNAUTHORIZED, "Invalid or expired token".to_string())
        })?;

        match state.accounts.find_by_id(claims.sub).await {
            Ok(Some(user)) => Ok(AuthUser {
                id: user.id,
                name: user.name,
                email: user.email,
            }),
            Ok(None) => {
                warn!(user_id = %claims.sub, "token for deleted user");
                Err((StatusCode::UNAUTHORIZED, "User not found".to_string()))
            }
            Err(e) => {
                error!(error = %e, user_id = %claims.sub, "account lookup failed");
                Err((StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string()))
            }
        }
    }
}
