use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::alerts::{AlertHub, ConnectionHandle, ConnectionId};
use crate::api::http::AppState;
use crate::logging::LogContext;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("userid must be a string or a number")]
    InvalidUserId,
}

/// A command sent by a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    StartAlert { userid: String, address: String },
    StopAlert { userid: String, address: String },
    Unknown(String),
}

impl ClientCommand {
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let value: Value = serde_json::from_str(text)?;
        let cmd = value
            .get("cmd")
            .and_then(Value::as_str)
            .ok_or(CommandError::MissingField("cmd"))?;

        match cmd {
            "START_ALERT" => {
                let (userid, address) = subscription_fields(&value)?;
                Ok(ClientCommand::StartAlert { userid, address })
            }
            "STOP_ALERT" => {
                let (userid, address) = subscription_fields(&value)?;
                Ok(ClientCommand::StopAlert { userid, address })
            }
            other => Ok(ClientCommand::Unknown(other.to_string())),
        }
    }
}

fn subscription_fields(value: &Value) -> Result<(String, String), CommandError> {
    let userid = match value.get("userid") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        Some(_) => return Err(CommandError::InvalidUserId),
        None => return Err(CommandError::MissingField("userid")),
    };

    let address = value
        .get("address")
        .and_then(Value::as_str)
        .ok_or(CommandError::MissingField("address"))?
        .to_string();

    Ok((userid, address))
}

/// Replies sent back on the subscriber's own connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cmd")]
pub enum ServerReply {
    #[serde(rename = "ALERT_STARTED")]
    AlertStarted { address: String },
    #[serde(rename = "ALERT_STOPPED")]
    AlertStopped { address: String },
    #[serde(rename = "ERROR")]
    Error { message: String },
}

impl ServerReply {
    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Apply one inbound text frame and return the reply, if any
pub fn handle_text(hub: &AlertHub, connection: ConnectionId, text: &str) -> Option<ServerReply> {
    let context = LogContext::new("websocket", "message").with_connection(connection);

    let command = match ClientCommand::parse(text) {
        Ok(command) => command,
        Err(CommandError::Malformed(e)) => {
            context.debug(&format!("Ignoring malformed message: {}", e));
            return None;
        }
        Err(e) => {
            return Some(ServerReply::Error { message: e.to_string() });
        }
    };

    match command {
        ClientCommand::StartAlert { userid, address } => {
            match hub.subscribe(&address, &userid, connection) {
                Ok(canonical) => {
                    context
                        .with_address(&canonical)
                        .with_metadata("userid", serde_json::json!(userid))
                        .info("Alert started");
                    Some(ServerReply::AlertStarted { address: canonical })
                }
                Err(e) => {
                    context
                        .with_metadata("address", serde_json::json!(address))
                        .warn(&format!("Subscription rejected: {}", e));
                    Some(ServerReply::Error { message: e.to_string() })
                }
            }
        }
        ClientCommand::StopAlert { userid, address } => {
            if hub.unsubscribe(&address, &userid, connection) {
                context
                    .with_metadata("address", serde_json::json!(address))
                    .with_metadata("userid", serde_json::json!(userid))
                    .info("Alert stopped");
                Some(ServerReply::AlertStopped { address })
            } else {
                Some(ServerReply::Error {
                    message: format!("No alert for {} on this connection", address),
                })
            }
        }
        ClientCommand::Unknown(cmd) => {
            context.debug(&format!("Ignoring unknown command {}", cmd));
            None
        }
    }
}

/// GET `/` and `/ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (handle, mut outbound) = ConnectionHandle::channel();
    let id = state.accept(handle);

    // drains every payload addressed to this connection into the socket
    let writer = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(result) = stream.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => text,
                Err(_) => continue,
            },
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                LogContext::new("websocket", "receive")
                    .with_connection(id)
                    .debug(&format!("WebSocket error: {}", e));
                break;
            }
        };

        if let Some(reply) = handle_text(&state.hub, id, &text) {
            let _ = state.registry.send_to(id, &reply.to_payload());
        }
    }

    // dropping the handle ends the writer; hub entries are pruned lazily
    state.registry.remove(id);
    let _ = writer.await;

    LogContext::new("websocket", "disconnect")
        .with_connection(id)
        .info("Client disconnected");
}
