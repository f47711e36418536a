use crate::app::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub mod api;
pub mod error;
pub mod middleware;
#[cfg(test)]
mod tests;
pub mod webhook;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/token", get(api::get_token))
        .route(
            "/api/call-history",
            get(api::list_call_history).post(api::add_call_history),
        )
        .route("/api/update-call-history", post(api::update_call_history))
        .route(
            "/api/contacts",
            get(api::list_contacts)
                .post(api::save_contact)
                .delete(api::delete_contact),
        )
        .route("/api/caller-ids", get(api::caller_ids))
        .route("/voice", post(webhook::voice))
        .route("/incoming", post(webhook::incoming))
}
