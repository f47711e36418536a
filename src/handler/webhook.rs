//! Voice provider webhooks.
//!
//! Both endpoints always answer HTTP 200 with call-control markup, even when
//! the request is invalid: the provider treats any other status as a failed
//! delivery, so business errors are reported by speaking a message on the
//! call instead. This deliberately departs from ordinary HTTP semantics.

use crate::app::AppState;
use crate::callerid::CallerIdConfig;
use crate::phone::{normalize_caller, validate_e164};
use crate::twiml::{self, VoiceResponse};
use axum::{
    extract::{rejection::FormRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

pub const INVALID_DESTINATION_MESSAGE: &str =
    "Invalid phone number format. Please use international format with plus sign.";
pub const INVALID_CALLER_ID_MESSAGE: &str = "Invalid caller ID format.";
pub const NO_CALLER_ID_MESSAGE: &str = "Unable to determine caller ID for this destination.";

const UNKNOWN: &str = "Unknown";

/// Returned if the markup itself cannot be rendered.
const FALLBACK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response><Say>An application error has occurred.</Say></Response>"#;

#[derive(Debug, Default, Deserialize)]
pub struct VoiceParams {
    #[serde(rename = "To")]
    pub to: Option<String>,
    #[serde(rename = "CallerId")]
    pub caller_id: Option<String>,
    #[serde(rename = "UseIsraelAlt", alias = "UseAlternate")]
    pub use_alternate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncomingParams {
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
}

fn markup(response: VoiceResponse) -> Response {
    let xml = match response.to_xml() {
        Ok(xml) => xml,
        Err(e) => {
            error!("failed to render call-control markup: {}", e);
            FALLBACK_XML.to_string()
        }
    };
    ([(header::CONTENT_TYPE, twiml::CONTENT_TYPE)], xml).into_response()
}

fn form_or_default<T: Default>(form: Result<Form<T>, FormRejection>, endpoint: &str) -> T {
    match form {
        Ok(Form(params)) => params,
        Err(rejection) => {
            warn!(endpoint, "unreadable webhook form: {}", rejection.body_text());
            T::default()
        }
    }
}

/// Builds the answer for an outgoing call placed by the softphone.
pub fn outgoing_response(caller_ids: &CallerIdConfig, params: &VoiceParams) -> VoiceResponse {
    let raw_to = params.to.as_deref().unwrap_or_default();
    let Some(to) = validate_e164(raw_to) else {
        warn!(to = raw_to, "invalid destination number format");
        return VoiceResponse::new().say(INVALID_DESTINATION_MESSAGE);
    };
    let use_alternate = params
        .use_alternate
        .as_deref()
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
    debug!(to = %to, use_alternate, caller_id = ?params.caller_id, "voice request");

    let custom = params
        .caller_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let caller_id = match custom {
        Some(custom) => match validate_e164(custom) {
            Some(caller_id) => {
                info!(caller_id = %caller_id, "using custom caller ID");
                caller_id
            }
            None => {
                warn!(caller_id = custom, "invalid caller ID format");
                return VoiceResponse::new().say(INVALID_CALLER_ID_MESSAGE);
            }
        },
        None => match caller_ids.select(&to, use_alternate) {
            Ok(caller_id) => caller_id,
            Err(e) => {
                warn!(to = %to, "caller ID selection failed: {}", e);
                return VoiceResponse::new().say(NO_CALLER_ID_MESSAGE);
            }
        },
    };

    info!(to = %to, caller_id = %caller_id, "outgoing call");
    VoiceResponse::new().dial_number(to, caller_id)
}

pub async fn voice(
    State(state): State<AppState>,
    form: Result<Form<VoiceParams>, FormRejection>,
) -> Response {
    let params = form_or_default(form, "voice");
    markup(outgoing_response(&state.config.caller_id, &params))
}

pub async fn incoming(
    State(state): State<AppState>,
    form: Result<Form<IncomingParams>, FormRejection>,
) -> Response {
    let params = form_or_default(form, "incoming");
    let from = params
        .from
        .map(|v| normalize_caller(&v))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let call_sid = params
        .call_sid
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());
    info!(from = %from, call_sid = %call_sid, "incoming call");

    let name = state.contacts.lookup(&from).await;
    if let Err(e) = state.history.record_incoming(&call_sid, &from, name).await {
        warn!(from = %from, call_sid = %call_sid, "incoming call not logged: {}", e);
    }

    let provider = &state.config.provider;
    markup(VoiceResponse::new().dial_client(
        provider.identity.clone(),
        provider.ring_timeout,
        vec![("CallSid".to_string(), call_sid)],
    ))
}
