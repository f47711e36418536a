use crate::app::{create_router, AppState, AppStateBuilder};
use crate::config::Config;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;


pub(super) const API_SECRET: &str = "test-secret";

pub(super) struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub dir: TempDir,
}

pub(super) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.data_dir = dir.to_string_lossy().into_owned();
    config.static_dir = dir.join("static").to_string_lossy().into_owned();
    config.provider.account_sid = Some("ACtest".to_string());
    config.provider.api_key = Some("SKtest".to_string());
    config.provider.api_secret = Some(API_SECRET.to_string());
    config.provider.app_sid = Some("APtest".to_string());
    config.caller_id.home.number = Some("+97230000000".to_string());
    config.caller_id.home.alternate = Some("+97230000001".to_string());
    config.caller_id.primary.number = Some("+15550001111".to_string());
    config
}

pub(super) fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let state = AppStateBuilder::new()
        .with_config(test_config(dir.path()))
        .build()
        .unwrap();
    let router = create_router(state.clone());
    TestApp { state, router, dir }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value) -> Response {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn form(&self, uri: &str, body: &str) -> Response {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

pub(super) async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub(super) async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

pub(super) async fn expect_json(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}
