use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::connection::ConnectionEvent;
use crate::error::Result;
use crate::host_record::HostRecord;
use crate::node::{Node, NodeStatusReport};

#[derive(Debug, Serialize, Deserialize)]
pub struct KnownHostsResponse {
    pub count: usize,
    pub hosts: Vec<HostRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpireKeysResponse {
    pub expired: usize,
}

/// Accept a connection notification; evaluation happens in the background
#[instrument(skip(state), level = "debug")]
pub async fn submit_connection(
    State(state): State<Node>,
    Json(event): Json<ConnectionEvent>,
) -> Result<StatusCode> {
    state.connection_established(event).await?;
    Ok(StatusCode::ACCEPTED)
}

#[instrument(skip(state), level = "debug")]
pub async fn known_hosts(State(state): State<Node>) -> Result<Json<KnownHostsResponse>> {
    let hosts = state.known_hosts().await?;
    Ok(Json(KnownHostsResponse {
        count: hosts.len(),
        hosts,
    }))
}

#[instrument(skip(state), level = "debug")]
pub async fn status(State(state): State<Node>) -> Result<Json<NodeStatusReport>> {
    state.status().await.map(Json)
}

#[instrument(skip(state), level = "debug")]
pub async fn expire_keys(State(state): State<Node>) -> Result<Json<ExpireKeysResponse>> {
    let expired = state.expire_keys().await?;
    Ok(Json(ExpireKeysResponse { expired }))
}
