//! WebSocket stream of stock updates
//!
//! Browsers cannot set headers on a WebSocket handshake, so the access token
//! travels in the query string and is checked before the upgrade.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::resolve_user;
use crate::services::StockNotifier;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StockStreamQuery {
    pub token: String,
    /// Only forward updates for this company. Any authenticated user may
    /// follow any company: stock levels are already public in the catalog.
    pub company_id: Option<Uuid>,
}

pub async fn stock_updates(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<StockStreamQuery>,
) -> Result<Response, AppError> {
    let user = resolve_user(&state, &query.token).await?;
    tracing::info!(user_id = %user.user_id, company_filter = ?query.company_id, "stock stream opened");

    let notifier = state.notifier.clone();
    Ok(ws.on_upgrade(move |socket| stream_updates(socket, notifier, query.company_id)))
}

async fn stream_updates(socket: WebSocket, notifier: StockNotifier, company_id: Option<Uuid>) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = notifier.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            let update = match updates.recv().await {
                Ok(update) => update,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "stock stream lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if company_id.is_some_and(|id| id != update.company_id) {
                continue;
            }
            let text = match serde_json::to_string(&update) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize stock update");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Incoming frames are ignored; the loop only notices the close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::debug!("stock stream closed");
}
