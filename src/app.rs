use crate::callrecord::{storage::CALL_HISTORY_FILE, CallHistoryService};
use crate::config::Config;
use crate::contacts::{ContactsDirectory, CONTACTS_FILE};
use crate::handler::middleware::request_log::log_requests;
use anyhow::Result;
use axum::{
    extract::State,
    middleware,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
};
use tracing::info;

pub struct AppStateInner {
    pub config: Arc<Config>,
    pub history: CallHistoryService,
    pub contacts: ContactsDirectory,
    pub token: CancellationToken,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

pub struct AppStateBuilder {
    pub config: Option<Config>,
    pub token: Option<CancellationToken>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            token: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn build(self) -> Result<AppState> {
        let config = Arc::new(self.config.unwrap_or_default());
        let history = CallHistoryService::open(config.data_path(CALL_HISTORY_FILE))?;
        let contacts = ContactsDirectory::open(config.data_path(CONTACTS_FILE))?;
        Ok(Arc::new(AppStateInner {
            config,
            history,
            contacts,
            token: self.token.unwrap_or_default(),
        }))
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn run(state: AppState, router: Router) -> Result<()> {
    let token = state.token.clone();
    let addr: SocketAddr = state.config.http_addr.parse()?;
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            return Err(anyhow::anyhow!("Failed to bind to {}: {}", addr, e));
        }
    };
    info!("listening on http://{}", addr);

    let shutdown = token.clone();
    let result = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await;

    match result {
        Ok(_) => info!("Server shut down gracefully"),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            return Err(anyhow::anyhow!("Server error: {}", e));
        }
    }
    token.cancel();
    Ok(())
}

async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    let index = Path::new(&state.config.static_dir).join("index.html");
    match tokio::fs::read_to_string(&index).await {
        Ok(content) => Html(content).into_response(),
        Err(e) => {
            tracing::error!("Failed to read {}: {}", index.display(), e);
            Html("<html><body><h1>Error loading page</h1></body></html>").into_response()
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    if !Path::new(&static_dir).join("index.html").exists() {
        tracing::warn!("{}/index.html does not exist", static_dir);
    }
    let static_files_service = ServeDir::new(&static_dir);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
            axum::http::header::ORIGIN,
        ]);

    let skip_paths = Arc::new(vec!["/static/*".to_string()]);

    Router::new()
        .route("/", get(index_handler))
        .nest_service("/static", static_files_service)
        .merge(crate::handler::router())
        .with_state(state)
        .layer(middleware::from_fn_with_state(skip_paths, log_requests))
        .layer(cors)
}
