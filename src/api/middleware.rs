use crate::api::AppState;
use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use std::net::{IpAddr, SocketAddr};

/// The caller's address, taken from connection metadata rather than the request body.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or_else(|| {
                tracing::error!("Connection info missing; router must be served with connect info");
                AppError::Internal
            })?;

        Ok(Self(state.rate_limit_service.extractor.identify_client_ip(&parts.headers, peer_ip)))
    }
}
