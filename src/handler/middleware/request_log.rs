use crate::handler::middleware::clientaddr::ClientAddr;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::CONTENT_LENGTH, Request},
    middleware::Next,
    response::Response,
};
use std::fmt::Write as _;
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tracing::field::{Field, Visit};
use tracing::{info, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{format, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

pub const ACCESS_LOG_TARGET: &str = "http.access";

/// Renders `http.access` events as one pipe-separated line and everything
/// else with the default formatter.
#[derive(Clone)]
pub struct AccessLogEventFormat<T = SystemTime> {
    timer: T,
}

impl<T> AccessLogEventFormat<T>
where
    T: FormatTime,
{
    pub fn new(timer: T) -> Self {
        Self { timer }
    }
}

impl<T> Default for AccessLogEventFormat<T>
where
    T: FormatTime + Default,
{
    fn default() -> Self {
        Self {
            timer: T::default(),
        }
    }
}

#[derive(Default)]
struct AccessLogFields {
    client_ip: Option<String>,
    method: Option<String>,
    status: Option<u64>,
    body_len: Option<String>,
    cost_ms: Option<f64>,
    uri: Option<String>,
}

impl AccessLogFields {
    fn render(&self) -> String {
        let dash = || "-".to_string();
        format!(
            "{} | {} | {} | {} | {} | {}",
            self.client_ip.clone().unwrap_or_else(dash),
            self.method.clone().unwrap_or_else(dash),
            self.status.map(|s| s.to_string()).unwrap_or_else(dash),
            self.body_len.clone().unwrap_or_else(dash),
            self.cost_ms
                .map(|ms| format!("{ms:.3}ms"))
                .unwrap_or_else(dash),
            self.uri.clone().unwrap_or_else(dash),
        )
    }

    fn set_text(&mut self, name: &str, value: String) {
        match name {
            "client_ip" => self.client_ip = Some(value),
            "method" => self.method = Some(value),
            "body_len" => self.body_len = Some(value),
            "uri" => self.uri = Some(value),
            _ => {}
        }
    }
}

impl Visit for AccessLogFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.set_text(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut rendered = String::new();
        let _ = write!(rendered, "{value:?}");
        self.set_text(field.name(), rendered.trim_matches('"').to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "status" {
            self.status = Some(value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "status" {
            self.status = u64::try_from(value).ok();
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if field.name() == "cost_ms" {
            self.cost_ms = Some(value);
        }
    }
}

impl<S, N, T> FormatEvent<S, N> for AccessLogEventFormat<T>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
    T: FormatTime + Clone,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        if metadata.target() != ACCESS_LOG_TARGET {
            return format::Format::default()
                .with_timer(self.timer.clone())
                .with_target(true)
                .with_source_location(false)
                .format_event(ctx, writer, event);
        }
        let mut fields = AccessLogFields::default();
        event.record(&mut fields);
        self.timer.format_time(&mut writer)?;
        writeln!(
            writer,
            " {} {} | {}",
            metadata.level(),
            metadata.target(),
            fields.render()
        )
    }
}

fn should_skip_logging(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| match pattern.strip_suffix('*') {
        Some(prefix) => path.starts_with(prefix),
        None => path == pattern,
    })
}

/// Logs one `http.access` event per request once the handler has answered.
pub async fn log_requests(
    State(skip_paths): State<Arc<Vec<String>>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let started_at = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().to_string();
    let skip = should_skip_logging(req.uri().path(), skip_paths.as_slice());
    let connect_info = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client_ip = ClientAddr::from_http_parts(req.headers(), connect_info)
        .ip()
        .to_string();

    let response = next.run(req).await;
    if skip {
        return response;
    }

    let body_len = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_string();
    info!(
        target: "http.access",
        client_ip = client_ip.as_str(),
        method = method.as_str(),
        status = response.status().as_u16(),
        body_len = body_len.as_str(),
        cost_ms = started_at.elapsed().as_secs_f64() * 1_000.0,
        uri = uri.as_str(),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_skip_logging() {
        let patterns = vec!["/static/*".to_string(), "/favicon.ico".to_string()];
        assert!(should_skip_logging("/static/app.js", &patterns));
        assert!(should_skip_logging("/favicon.ico", &patterns));
        assert!(!should_skip_logging("/api/contacts", &patterns));
        assert!(!should_skip_logging("/favicon.ico.map", &patterns));
    }

    #[test]
    fn test_render_missing_fields() {
        let mut fields = AccessLogFields::default();
        fields.set_text("method", "POST".to_string());
        fields.status = Some(404);
        fields.cost_ms = Some(1.5);
        assert_eq!(fields.render(), "- | POST | 404 | - | 1.500ms | -");
    }
}
