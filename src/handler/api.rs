use super::error::ApiError;
use crate::app::AppState;
use crate::callrecord::{deserialize_seconds, CallRecord};
use crate::contacts::Contacts;
use crate::token::{AccessTokenBuilder, IssuedToken};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct UpdateCallRequest {
    #[serde(alias = "call_id")]
    pub call_sid: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_seconds")]
    pub duration: u64,
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub number: Option<String>,
    pub name: Option<String>,
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {}", field)))
}

fn credential<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("provider {} is not configured", name)))
}

pub async fn get_token(State(state): State<AppState>) -> Result<Json<IssuedToken>, ApiError> {
    let provider = &state.config.provider;
    let issued = AccessTokenBuilder::new(
        credential(&provider.account_sid, "account_sid")?,
        credential(&provider.api_key, "api_key")?,
        credential(&provider.api_secret, "api_secret")?,
        credential(&provider.app_sid, "app_sid")?,
    )
    .with_identity(provider.identity.clone())
    .with_ttl(provider.token_ttl)
    .build()?;
    info!(identity = %issued.identity, ttl = issued.ttl, "access token generated");
    Ok(Json(issued))
}

pub async fn list_call_history(State(state): State<AppState>) -> Json<Vec<CallRecord>> {
    Json(state.history.list().await)
}

/// Only outgoing calls are created here. Incoming calls are created by the
/// `/incoming` webhook and completed through `/api/update-call-history`.
pub async fn add_call_history(
    State(state): State<AppState>,
    body: Result<Json<CallRecord>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let entry = json_body(body)?;
    state.history.record_outgoing(entry).await?;
    Ok(success())
}

pub async fn update_call_history(
    State(state): State<AppState>,
    body: Result<Json<UpdateCallRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = json_body(body)?;
    let call_sid = required(request.call_sid, "call_sid")?;
    let status = required(request.status, "status")?;
    info!(call_sid = %call_sid, status = %status, duration = request.duration, "updating call");
    state
        .history
        .update_outcome(&call_sid, &status, request.duration)
        .await?;
    Ok(success())
}

pub async fn list_contacts(State(state): State<AppState>) -> Json<Contacts> {
    Json(state.contacts.list().await)
}

pub async fn save_contact(
    State(state): State<AppState>,
    body: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = json_body(body)?;
    let number = required(request.number, "number")?;
    let name = request
        .name
        .ok_or_else(|| ApiError::BadRequest("Missing name".to_string()))?;
    state.contacts.upsert(&number, &name).await?;
    Ok(success())
}

pub async fn delete_contact(
    State(state): State<AppState>,
    body: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = json_body(body)?;
    let number = required(request.number, "number")?;
    state.contacts.delete(&number).await?;
    Ok(success())
}

pub async fn caller_ids(State(state): State<AppState>) -> Json<BTreeMap<String, Option<String>>> {
    Json(state.config.caller_id.as_map())
}
