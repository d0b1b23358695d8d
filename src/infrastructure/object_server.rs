use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info};

use crate::domain::errors::DomainError;
use crate::infrastructure::repositories::file_object_store::FileObjectStore;

/// Serves the objects of a [`FileObjectStore`] at their public URLs.
///
/// Only `GET` and `HEAD` are answered; everything else is the embedding
/// application's concern.
pub struct ObjectServer {
    store: Arc<FileObjectStore>,
    mount_path: String,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl ObjectServer {
    /// `mount_path` is the path component of the store's public base URL.
    pub fn new(store: Arc<FileObjectStore>, mount_path: &str) -> Self {
        Self {
            store,
            mount_path: mount_path.trim_end_matches('/').to_string(),
            stop_tx: Mutex::new(None),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(&format!("{}/*key", self.mount_path), get(handle_object))
            .with_state(Arc::clone(&self.store))
    }

    /// Bind `addr` and serve in the background. Returns the bound address.
    pub async fn start(&self, addr: SocketAddr) -> Result<SocketAddr, DomainError> {
        let mut stop_tx = self.stop_tx.lock().await;
        if stop_tx.is_some() {
            return Err(DomainError::InvalidData(
                "Object server is already running".to_string(),
            ));
        }

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind object server to {}: {}", addr, e);
            DomainError::InternalError(format!("Failed to bind {}: {}", addr, e))
        })?;
        let local_addr = listener.local_addr().map_err(|e| {
            DomainError::InternalError(format!("Failed to read bound address: {}", e))
        })?;

        let (tx, rx) = oneshot::channel();
        *stop_tx = Some(tx);

        let app = self.router();
        info!("Object server listening on http://{}{}", local_addr, self.mount_path);

        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    rx.await.ok();
                    info!("Object server shutting down");
                })
                .await;

            if let Err(e) = result {
                error!("Object server stopped with error: {}", e);
            }
        });

        Ok(local_addr)
    }

    pub async fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().await.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle_object(
    State(store): State<Arc<FileObjectStore>>,
    Path(key): Path<String>,
) -> Response {
    match store.get(&key).await {
        Ok((bytes, metadata)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, metadata.content_type),
                (header::CACHE_CONTROL, metadata.cache_control),
            ],
            bytes,
        )
            .into_response(),
        Err(DomainError::NotFound(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(DomainError::InvalidData(message)) => {
            (StatusCode::BAD_REQUEST, message).into_response()
        }
        Err(e) => {
            error!("Failed to serve object {}: {}", key, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
