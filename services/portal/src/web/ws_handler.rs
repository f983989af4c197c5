//! services/portal/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a reader WebSocket connection.
//! The identity is resolved in the background while the connection is already
//! accepting messages; anything that needs it waits until it settles.

use crate::web::{
    middleware::{identity_for_session, session_cookie},
    protocol::{ClientMessage, ServerMessage},
    reader::{ReaderConnection, ReaderSettings},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use reading_portal_core::IdentityCell;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
///
/// Signed-out visitors may read; their position is simply never stored.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let auth_session_id = session_cookie(&headers).map(str::to_owned);
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, auth_session_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, auth_session_id: Option<String>) {
    info!("New reader connection established.");

    let (mut ws_sender, mut receiver) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // --- 1. Identity Resolution ---
    let identity = IdentityCell::unresolved();
    let resolver = {
        let cell = identity.clone();
        let accounts = app_state.accounts.clone();
        tokio::spawn(async move {
            let resolved = identity_for_session(accounts.as_ref(), auth_session_id.as_deref()).await;
            debug!(identity = ?resolved, "Reader identity resolved.");
            cell.resolve(resolved);
        })
    };

    // --- 2. Outbound Writer ---
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {:?}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                debug!("Client went away; stopping writer.");
                break;
            }
        }
    });

    // --- 3. Main Message Loop ---
    let mut connection = ReaderConnection::new(
        app_state.store.clone(),
        Arc::new(identity),
        outbound,
        ReaderSettings::from(app_state.config.as_ref()),
    );

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(message) => connection.handle(message).await,
                Err(e) => warn!("Failed to deserialize client message: {}", e),
            },
            Ok(Message::Close(_)) => {
                info!("Client sent close message.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Reader connection error: {}", e);
                break;
            }
        }
    }

    // --- 4. Cleanup ---
    // Dropping the connection abandons pending progress writes and closes the outbound channel.
    drop(connection);
    resolver.abort();
    if let Err(e) = writer.await {
        error!("Writer task failed: {:?}", e);
    }
    info!("Reader connection closed.");
}
