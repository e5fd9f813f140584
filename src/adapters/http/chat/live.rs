//! WebSocket endpoint for live message delivery.
//!
//! Route: `GET /api/conversations/:id/live`
//!
//! # Connection Flow
//! 1. Caller authenticates (Bearer header or `access_token` query parameter)
//! 2. Participation is checked before the upgrade; 403/404 otherwise
//! 3. The socket subscribes to the conversation's delivery channel
//! 4. Server sends `connected`, then the full `history`
//! 5. Each committed message is pushed as `message.inserted`
//! 6. If the channel degrades, server sends `degraded` and closes; the
//!    client reconnects and receives a fresh history snapshot
//!
//! Subscribing before reading history means nothing committed in between is
//! lost; the client drops duplicates by message id.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::chat::ListMessagesQuery;
use crate::domain::chat::ParticipantRole;
use crate::domain::foundation::{ConversationId, Timestamp, UserId};
use crate::ports::{DeliveryEvent, DeliveryListener};

use super::dto::MessageResponse;
use super::handlers::{parse_conversation_id, ChatApiError, ChatAppState};

// ============================================
// Frames
// ============================================

/// Server → client frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Connected(ConnectedFrame),
    History { messages: Vec<MessageResponse> },
    #[serde(rename = "message.inserted")]
    MessageInserted { message: MessageResponse },
    /// Live delivery stopped. Reconnect to resync.
    Degraded { reason: String },
    Error { code: String, message: String },
    Pong,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedFrame {
    pub conversation_id: String,
    pub role: ParticipantRole,
    pub timestamp: String,
}

/// Client → server frames.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Ping,
}

impl From<DeliveryEvent> for ServerFrame {
    fn from(event: DeliveryEvent) -> Self {
        match event {
            DeliveryEvent::Message(message) => ServerFrame::MessageInserted {
                message: message.into(),
            },
            DeliveryEvent::Degraded { reason } => ServerFrame::Degraded { reason },
        }
    }
}

/// Forwards bus events into the socket's outbound queue.
struct FrameListener {
    tx: mpsc::UnboundedSender<ServerFrame>,
}

impl DeliveryListener for FrameListener {
    fn on_event(&self, event: DeliveryEvent) {
        // Receiver gone means the socket is closing.
        let _ = self.tx.send(event.into());
    }
}

// ============================================
// Upgrade
// ============================================

/// Upgrade to a live delivery socket after checking participation.
pub async fn live_conversation(
    ws: WebSocketUpgrade,
    State(state): State<ChatAppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Response, ChatApiError> {
    let conversation_id = parse_conversation_id(&id)?;
    let conversation = state.service.conversation_for(conversation_id, &user.id).await?;
    let role = conversation
        .role_of(&user.id)
        .unwrap_or(ParticipantRole::Buyer);

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, conversation_id, user.id, role))
        .into_response())
}

async fn handle_socket(
    socket: WebSocket,
    state: ChatAppState,
    conversation_id: ConversationId,
    viewer: UserId,
    role: ParticipantRole,
) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let handle = match state
        .bus
        .subscribe(conversation_id, Arc::new(FrameListener { tx: tx.clone() }))
        .await
    {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(%conversation_id, error = %e, "live subscription failed");
            let _ = send_frame(
                &mut sender,
                &ServerFrame::Degraded {
                    reason: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    let connected = ServerFrame::Connected(ConnectedFrame {
        conversation_id: conversation_id.to_string(),
        role,
        timestamp: Timestamp::now().to_rfc3339(),
    });
    if send_frame(&mut sender, &connected).await.is_err() {
        state.bus.unsubscribe(&handle);
        return;
    }

    let history = match state
        .service
        .list_messages(ListMessagesQuery {
            conversation_id,
            viewer: viewer.clone(),
        })
        .await
    {
        Ok(history) => ServerFrame::History {
            messages: history.into_iter().map(Into::into).collect(),
        },
        Err(e) => ServerFrame::Error {
            code: e.code().to_string(),
            message: e.to_string(),
        },
    };
    let _ = tx.send(history);

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let last = matches!(frame, ServerFrame::Degraded { .. });
            if let Err(e) = send_frame(&mut sender, &frame).await {
                tracing::debug!("Send error, closing connection: {}", e);
                break;
            }
            if last {
                let _ = sender.send(WsMessage::Close(None)).await;
                break;
            }
        }
    });

    let pong_tx = tx;
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(ClientFrame::Ping) => {
                        if pong_tx.send(ServerFrame::Pong).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::debug!("Ignoring unknown client frame: {}", e),
                },
                Ok(WsMessage::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.bus.unsubscribe(&handle);
    tracing::debug!(%conversation_id, viewer = %viewer, "live connection closed");
}

async fn send_frame(
    sender: &mut futures::stream::SplitSink<WebSocket, WsMessage>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).map_err(axum::Error::new)?;
    sender.send(WsMessage::Text(json)).await
}
