use crate::api::AppState;
use crate::api::middleware::ClientIp;
use crate::api::schemas::auth::{CreateTokens, Refresh, TokenPair as TokenPairSchema};
use crate::domain::token::TokenPair;
use crate::error::{AppError, Result};
use axum::{Json, extract::State, extract::rejection::JsonRejection, response::IntoResponse};
use uuid::Uuid;

pub async fn create_tokens(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: std::result::Result<Json<CreateTokens>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload.map_err(|_| AppError::BadRequest("invalid request".into()))?;
    let user_id = Uuid::parse_str(&payload.user_id).map_err(|_| AppError::BadRequest("invalid user ID".into()))?;

    let pair = state.token_service.create_token_pair(user_id, ip).await?;
    Ok(Json(map_pair(pair)))
}

/// Every rotation failure is reported as the same 401 so callers cannot tell an unknown
/// token from an expired or replayed one. The specific kind is logged by the service.
pub async fn refresh_tokens(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: std::result::Result<Json<Refresh>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload.map_err(|_| AppError::BadRequest("invalid request".into()))?;

    let pair =
        state.token_service.refresh_tokens(&payload.refresh_token, ip).await.map_err(|_| AppError::Unauthorized)?;
    Ok(Json(map_pair(pair)))
}

fn map_pair(pair: TokenPair) -> TokenPairSchema {
    TokenPairSchema { access_token: pair.access_token, refresh_token: pair.refresh_token }
}
