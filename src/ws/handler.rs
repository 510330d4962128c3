//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::world::ConnectionId;
use crate::ws::registry::{outbound_channel, OutboundReceiver};
use crate::ws::router::{RouteError, Routed};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sink, ws_stream) = socket.split();

    let (outbound_tx, outbound_rx) = outbound_channel(state.config.outbound_queue);
    let conn_id = state.registry.register(outbound_tx);
    info!(conn_id = %conn_id, connections = state.registry.len(), "New WebSocket connection");

    state.dispatcher.welcome(conn_id);

    // Writer task: outbound messages -> WebSocket
    let writer_handle = tokio::spawn(writer_task(conn_id, ws_sink, outbound_rx));

    run_session(conn_id, ws_stream, &state).await;

    // Cleanup on disconnect
    state.router.disconnect(conn_id);
    writer_handle.abort();

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Reader loop: WebSocket -> router, until the client goes away
async fn run_session(conn_id: ConnectionId, mut ws_stream: SplitStream<WebSocket>, state: &AppState) {
    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                match state.router.handle_text(conn_id, &text) {
                    Ok(Routed::Applied) => {}
                    Ok(Routed::UnknownConnection) => {
                        debug!(conn_id = %conn_id, "Event from connection without a participant, ignored");
                    }
                    Err(RouteError::NameConflict(e)) => {
                        info!(conn_id = %conn_id, error = %e, "Join rejected");
                    }
                    Err(RouteError::Validation(e)) => {
                        warn!(conn_id = %conn_id, error = %e, "Dropped invalid client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Write the connection's outbound messages to the socket
async fn writer_task(
    conn_id: ConnectionId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: OutboundReceiver,
) {
    while let Some(payload) = outbound_rx.recv().await {
        if let Err(e) = ws_sink.send(Message::Text(payload.to_string())).await {
            debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
            break;
        }
    }
    let _ = ws_sink.close().await;
}
