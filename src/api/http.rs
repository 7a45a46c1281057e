use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::alerts::{AlertHub, ConnectionHandle, ConnectionId, ConnectionRegistry};
use crate::api::ws::ws_handler;
use crate::config::ServerConfig;
use crate::database::{DbError, ProgressStore};
use crate::price::PriceBroadcaster;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("Server error: {0}")]
    Server(String),
}

impl From<ApiError> for StatusCode {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Bind { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Response structure for status endpoint
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub last_processed_block: Option<u64>,
    pub connections: usize,
    pub watched_addresses: usize,
    pub subscriptions: usize,
    pub price_available: bool,
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<AlertHub>,
    pub registry: Arc<ConnectionRegistry>,
    pub store: Arc<dyn ProgressStore>,
    pub broadcaster: Option<Arc<PriceBroadcaster>>,
}

impl AppState {
    /// Register a freshly upgraded connection, greeting it with the
    /// cached price when the price relay is running
    pub fn accept(&self, handle: ConnectionHandle) -> ConnectionId {
        match &self.broadcaster {
            Some(broadcaster) => broadcaster.accept(handle),
            None => self.registry.insert(handle),
        }
    }
}

/// WebSocket and status server
pub struct RelayServer {
    state: AppState,
    config: ServerConfig,
}

impl RelayServer {
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self { state, config }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/status", get(get_status))
            .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
            .with_state(self.state.clone())
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, ApiError> {
        let addr = self.config.bind_address();
        TcpListener::bind(&addr).await.map_err(|e| ApiError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        })
    }

    /// Bind the configured address and serve until the process ends
    pub async fn start(&self) -> Result<(), ApiError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ApiError> {
        if let Ok(addr) = listener.local_addr() {
            log::info!("Relay server listening on {}", addr);
        }

        axum::serve(listener, self.router())
            .await
            .map_err(|e| ApiError::Server(format!("Server error: {}", e)))
    }
}

/// GET /status - relay health and table sizes
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.store.load() {
        Ok(last_processed_block) => Ok(Json(StatusResponse {
            status: "healthy".to_string(),
            last_processed_block,
            connections: state.registry.len(),
            watched_addresses: state.hub.watched_address_count(),
            subscriptions: state.hub.subscription_count(),
            price_available: state
                .broadcaster
                .as_ref()
                .is_some_and(|broadcaster| broadcaster.last_price().is_some()),
        })),
        Err(e) => {
            log::error!("Failed to read progress for status: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "database_error".to_string(),
                    message: format!("Failed to retrieve status data: {}", e),
                }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const USDT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    struct BrokenStore;

    impl ProgressStore for BrokenStore {
        fn load(&self) -> Result<Option<u64>, DbError> {
            Err(DbError::Operation("locked".to_string()))
        }

        fn save(&self, _height: u64) -> Result<(), DbError> {
            Ok(())
        }
    }

    fn state(store: Arc<dyn ProgressStore>) -> AppState {
        let registry = Arc::new(ConnectionRegistry::new());
        AppState {
            hub: Arc::new(AlertHub::new(Arc::clone(&registry))),
            registry,
            store,
            broadcaster: None,
        }
    }

    async fn status_body(server: &RelayServer) -> (StatusCode, serde_json::Value) {
        let response = server
            .router()
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let db = Arc::new(Database::new_in_memory().unwrap());
        db.save(12).unwrap();
        let state = state(db);

        let (handle, _rx) = ConnectionHandle::channel();
        let id = state.accept(handle);
        state.hub.subscribe(USDT, "alice", id).unwrap();

        let server = RelayServer::new(state, ServerConfig::default());
        let (status, body) = status_body(&server).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["last_processed_block"], 12);
        assert_eq!(body["connections"], 1);
        assert_eq!(body["watched_addresses"], 1);
        assert_eq!(body["subscriptions"], 1);
        assert_eq!(body["price_available"], false);
    }

    #[tokio::test]
    async fn test_status_on_fresh_store() {
        let server = RelayServer::new(
            state(Arc::new(Database::new_in_memory().unwrap())),
            ServerConfig::default(),
        );
        let (_, body) = status_body(&server).await;
        assert!(body["last_processed_block"].is_null());
    }

    #[tokio::test]
    async fn test_status_store_failure() {
        let server = RelayServer::new(state(Arc::new(BrokenStore)), ServerConfig::default());
        let (status, body) = status_body(&server).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "database_error");
    }

    #[tokio::test]
    async fn test_plain_get_on_ws_route_is_rejected() {
        let server = RelayServer::new(
            state(Arc::new(Database::new_in_memory().unwrap())),
            ServerConfig::default(),
        );
        let response = server
            .router()
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = RelayServer::new(
            state(Arc::new(Database::new_in_memory().unwrap())),
            ServerConfig {
                host: "127.0.0.1".to_string(),
                port,
            },
        );

        assert!(matches!(server.start().await, Err(ApiError::Bind { .. })));
    }
}
