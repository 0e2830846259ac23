// src/livereload/server.rs

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Sse};
use axum::routing::get;
use axum::Router;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::errors::{AssetdagError, Result};
use crate::livereload::clients::{ClientId, ReloadClientSet};

const CLIENT_SCRIPT: &str = include_str!("../../assets/livereload.js");

/// `GET /livereload` (event stream) and `GET /livereload.js` (client).
pub fn router(clients: Arc<ReloadClientSet>) -> Router {
    Router::new()
        .route("/livereload", get(handle_sse))
        .route("/livereload.js", get(handle_script))
        .with_state(clients)
}

/// Bind `addr` and serve until the task is dropped.
pub async fn serve(addr: SocketAddr, clients: Arc<ReloadClientSet>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AssetdagError::Other(anyhow::anyhow!("binding live-reload server to {addr}: {e}")))?;
    info!(%addr, "live-reload server listening");
    axum::serve(listener, router(clients))
        .await
        .map_err(|e| AssetdagError::Other(anyhow::anyhow!("live-reload server: {e}")))
}

/// Unregisters the client when the response stream is dropped.
struct Disconnect {
    id: ClientId,
    clients: Arc<ReloadClientSet>,
}

impl Drop for Disconnect {
    fn drop(&mut self) {
        self.clients.disconnect(self.id);
    }
}

async fn handle_sse(
    State(clients): State<Arc<ReloadClientSet>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (id, rx) = clients.connect();
    debug!(client = id, connected = clients.len(), "live-reload stream opened");

    let guard = Disconnect {
        id,
        clients: clients.clone(),
    };
    let stream = ReceiverStream::new(rx).map(move |data| {
        let _keep = &guard;
        Ok(Event::default().data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}

async fn handle_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_SCRIPT,
    )
}
