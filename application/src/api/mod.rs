//! HTTP API definitions.

pub mod assistant;
pub mod session;

use std::{collections::HashMap, sync::Arc};

use axum::{Extension, Json};
use common::Sol;
use serde::Serialize;

/// Publicly visible part of the application configuration.
///
/// Echoed by the health endpoint, so must never carry secrets.
#[derive(Clone, Debug)]
pub struct PublicConfig {
    /// Default product a session is created for.
    pub product: String,

    /// Address expected to receive payments.
    pub receiver: String,

    /// Price of a session, in the major currency unit.
    pub price: Sol,

    /// Allowed CORS origins.
    pub cors: Vec<String>,
}

/// `GET /health` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Indicates the application is up.
    pub ok: bool,

    /// Address expected to receive payments.
    pub receiver: String,

    /// Price of a session, in the major currency unit.
    pub price_sol: Sol,

    /// Allowed CORS origins.
    pub cors: Vec<String>,
}

/// Handles `GET /health` requests by echoing the public configuration.
#[expect(
    clippy::unused_async,
    reason = "`async` is required to match handler signature"
)]
pub async fn health(
    Extension(config): Extension<Arc<PublicConfig>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        receiver: config.receiver.clone(),
        price_sol: config.price,
        cors: config.cors.clone(),
    })
}

/// Handles `GET /prices` requests by listing per-product prices.
#[expect(
    clippy::unused_async,
    reason = "`async` is required to match handler signature"
)]
pub async fn prices(
    Extension(config): Extension<Arc<PublicConfig>>,
) -> Json<HashMap<String, Sol>> {
    Json(HashMap::from([(config.product.clone(), config.price)]))
}
