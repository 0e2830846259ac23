// src/livereload/clients.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Messages a client may have queued before further ones are dropped.
pub const CLIENT_BUFFER: usize = 16;

pub type ClientId = u64;

#[derive(Debug, Serialize)]
struct ReloadMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    path: &'a str,
}

/// Browsers currently connected to the live-reload endpoint.
#[derive(Debug, Default)]
pub struct ReloadClientSet {
    clients: RwLock<HashMap<ClientId, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl ReloadClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client; it receives serialized messages on the returned
    /// channel until it is dropped or disconnected.
    pub fn connect(&self) -> (ClientId, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        self.clients.write().insert(id, tx);
        debug!(client = id, "live-reload client connected");
        (id, rx)
    }

    pub fn disconnect(&self, id: ClientId) {
        if self.clients.write().remove(&id).is_some() {
            debug!(client = id, "live-reload client disconnected");
        }
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Tell every client that `path` changed. Returns the number of clients
    /// the message was queued for.
    ///
    /// At most once: a client whose buffer is full misses this message,
    /// a client that went away is removed.
    pub fn notify(&self, path: &str) -> usize {
        let payload = match serde_json::to_string(&ReloadMessage { kind: "change", path }) {
            Ok(p) => p,
            Err(err) => {
                warn!(path, error = %err, "serializing reload message");
                return 0;
            }
        };

        let mut reached = 0;
        let mut gone = Vec::new();
        {
            let clients = self.clients.read();
            for (id, tx) in clients.iter() {
                match tx.try_send(payload.clone()) {
                    Ok(()) => reached += 1,
                    Err(TrySendError::Full(_)) => {
                        debug!(client = id, path, "client buffer full, dropping reload");
                    }
                    Err(TrySendError::Closed(_)) => gone.push(*id),
                }
            }
        }
        if !gone.is_empty() {
            let mut clients = self.clients.write();
            for id in gone {
                clients.remove(&id);
            }
        }

        debug!(path, clients = reached, "reload sent");
        reached
    }
}
