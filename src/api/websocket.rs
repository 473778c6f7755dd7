//! Live opportunity stream over WebSocket.
//!
//! On connect the client receives a `snapshot` message, then a `scan_result`
//! message after every published cycle. Clients may send `ping`,
//! `get_opportunities` or `get_stats`, either as JSON `{"type": "..."}` or as a
//! bare command string.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::handlers::AppState;
use crate::arbitrage::Opportunity;
use crate::scanner::{OpportunityQuery, ScannerStats, DEFAULT_LIMIT};

/// Commands a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Ping,
    GetOpportunities {
        #[serde(default)]
        limit: Option<usize>,
    },
    GetStats,
}

impl ClientCommand {
    /// Parse JSON or a bare command name.
    pub fn parse(text: &str) -> Option<Self> {
        if let Ok(command) = serde_json::from_str::<Self>(text) {
            return Some(command);
        }
        match text.trim() {
            "ping" => Some(Self::Ping),
            "get_opportunities" => Some(Self::GetOpportunities { limit: None }),
            "get_stats" => Some(Self::GetStats),
            _ => None,
        }
    }
}

/// Replies to client commands.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerReply {
    Pong {
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    Opportunities {
        opportunities: Vec<Opportunity>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Stats {
        stats: ScannerStats,
    },
    Error {
        error: String,
    },
}

/// `GET /ws`.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (initial, mut rx) = state.scanner.subscribe();
    if send_json(&mut socket, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(message) => {
                    if send_json(&mut socket, message.as_ref()).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "WebSocket subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let reply = reply_to(&state, &text);
                    if send_json(&mut socket, &reply).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }
}

/// Answer one client command.
pub fn reply_to(state: &AppState, text: &str) -> ServerReply {
    match ClientCommand::parse(text) {
        Some(ClientCommand::Ping) => ServerReply::Pong {
            timestamp: OffsetDateTime::now_utc(),
        },
        Some(ClientCommand::GetOpportunities { limit }) => {
            let result = state.scanner.query(&OpportunityQuery {
                limit: limit.unwrap_or(DEFAULT_LIMIT),
                ..OpportunityQuery::default()
            });
            ServerReply::Opportunities {
                opportunities: result.opportunities,
                reason: result.reason,
            }
        }
        Some(ClientCommand::GetStats) => ServerReply::Stats {
            stats: state.scanner.stats(),
        },
        None => ServerReply::Error {
            error: format!("unknown command: {}", text.trim()),
        },
    }
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(value) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Failed to serialize WebSocket message");
            return Ok(());
        }
    };
    socket.send(Message::Text(text)).await
}
