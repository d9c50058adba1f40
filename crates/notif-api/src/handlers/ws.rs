//! WebSocket session endpoint.
//!
//! Each connection gets a [`Session`] in the registry and two tasks: a writer
//! that drains the session's outbound queue onto the socket (plus keep-alive
//! pings), and a reader that discards inbound frames and notices when the peer
//! goes away. Whichever finishes first ends the session.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, info, warn};

use notif_core::{CloseReason, OutboundFrame, Session, SessionConfig};

use crate::error::ApiError;
use crate::handlers::notifications::USERNAME_REQUIRED;
use crate::query_types::{non_blank, SessionParams};
use crate::state::AppState;

/// `GET /ws?username=` (upgrade)
///
/// The identity is checked before the upgrade so a bad request gets a plain
/// 400 instead of a socket.
pub async fn ws_handler(
    ws: Option<WebSocketUpgrade>,
    Query(params): Query<SessionParams>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let Some(username) = non_blank(params.username) else {
        if non_blank(params.user_id).is_some() {
            return Err(ApiError::BadRequest(format!(
                "{USERNAME_REQUIRED} (userId is not supported)"
            )));
        }
        return Err(ApiError::BadRequest(USERNAME_REQUIRED.to_string()));
    };
    let Some(ws) = ws else {
        return Err(ApiError::UpgradeRequired(
            "websocket upgrade required".to_string(),
        ));
    };

    let failed_for = username.clone();
    Ok(ws
        .on_failed_upgrade(move |e| {
            warn!(subsystem = "api", component = "ws", username = %failed_for, error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| handle_socket(socket, state, username)))
}

async fn handle_socket(socket: WebSocket, state: AppState, username: String) {
    let (session, outbound) = Session::new(username, state.sessions.buffer);
    state.registry.attach(session.clone()).await;

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(
        sink,
        session.clone(),
        outbound,
        state.sessions.clone(),
    ));
    let mut reader = tokio::spawn(read_loop(stream));

    tokio::select! {
        _ = &mut writer => {
            reader.abort();
        }
        _ = &mut reader => {
            session.close(CloseReason::PeerClosed);
            let _ = writer.await;
        }
    }

    state.registry.detach(session.identity(), &session).await;
    session.close(CloseReason::PeerClosed);

    info!(
        subsystem = "api",
        component = "ws",
        username = %session.identity(),
        session_id = %session.id(),
        reason = session.close_reason().map_or("unknown", |r| r.as_str()),
        "WebSocket connection closed"
    );
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    session: Arc<Session>,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    config: SessionConfig,
) {
    let mut ping = interval_at(Instant::now() + config.ping_interval, config.ping_interval);

    let reason = loop {
        tokio::select! {
            biased;
            reason = session.closed() => break reason,
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    break CloseReason::Shutdown;
                };
                let message = Message::Text(frame.to_string());
                if let Err(reason) = send_with_deadline(&mut sink, message, config.write_timeout).await {
                    session.close(reason);
                    break reason;
                }
            }
            _ = ping.tick() => {
                if let Err(reason) = send_with_deadline(&mut sink, Message::Ping(Vec::new()), config.write_timeout).await {
                    session.close(reason);
                    break reason;
                }
            }
        }
    };

    if reason != CloseReason::WriteFailed {
        let close = Message::Close(Some(CloseFrame {
            code: close_code_for(reason),
            reason: Cow::Borrowed(reason.as_str()),
        }));
        let _ = send_with_deadline(&mut sink, close, config.write_timeout).await;
    }
    debug!(
        subsystem = "api",
        component = "ws",
        session_id = %session.id(),
        reason = reason.as_str(),
        "Session writer stopped"
    );
}

async fn send_with_deadline(
    sink: &mut SplitSink<WebSocket, Message>,
    message: Message,
    deadline: Duration,
) -> Result<(), CloseReason> {
    match timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) | Err(_) => Err(CloseReason::WriteFailed),
    }
}

/// Drain inbound frames until the peer closes or the connection errors.
async fn read_loop(mut stream: SplitStream<WebSocket>) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

fn close_code_for(reason: CloseReason) -> u16 {
    match reason {
        CloseReason::Replaced | CloseReason::Unresponsive => close_code::POLICY,
        CloseReason::Shutdown => close_code::AWAY,
        CloseReason::WriteFailed => close_code::ERROR,
        CloseReason::PeerClosed => close_code::NORMAL,
    }
}
