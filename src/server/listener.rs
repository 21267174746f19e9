//! WebSocket listener and per-connection main loop

use super::connection::{
    client_writer_task, identity_from_cookies, session_id_from_path, ClientConnection,
};
use super::game::{self, MoveOutcome};
use super::ServerContext;
use crate::protocol::{parse_envelope, parse_payload, Envelope, MessageType, MovePayload};
use crate::registry::StartSignal;
use crate::store::StoreError;
use anyhow::Result;
use futures_util::{Sink, SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{header::COOKIE, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Accepts client connections for one server process
pub struct ServerListener {
    listener: TcpListener,
    ctx: Arc<ServerContext>,
}

impl ServerListener {
    /// Bind to the configured listen address
    pub async fn bind(ctx: Arc<ServerContext>) -> Result<Self> {
        let addr = ctx.config.listen_addr;
        Self::bind_to(ctx, addr).await
    }

    /// Bind to an explicit address (port 0 picks a free port)
    pub async fn bind_to(ctx: Arc<ServerContext>, addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);
        Ok(Self { listener, ctx })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let ctx = Arc::clone(&self.ctx);
                            tokio::spawn(async move {
                                if let Err(e) = handle_client(stream, addr, ctx).await {
                                    tracing::error!("Client {} error: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        tracing::info!("Cleaning up server resources");
        self.ctx.shutdown().await;
        Ok(())
    }
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

/// How long a refused duplicate's queue gets to flush before it is cut off
const DUPLICATE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Close an upgraded socket that may not join its session
async fn refuse<W>(writer: &mut W, code: CloseCode, reason: &'static str)
where
    W: Sink<Message> + Unpin,
{
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    let _ = writer.send(Message::Close(Some(frame))).await;
    let _ = writer.close().await;
}

/// Handle a single client connection
async fn handle_client(stream: TcpStream, addr: SocketAddr, ctx: Arc<ServerContext>) -> Result<()> {
    let prefix = ctx.config.ws_path_prefix.clone();
    let cookie_name = ctx.config.identity_cookie.clone();

    let mut handshake: Option<(String, String)> = None;
    let callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let Some(session_id) = session_id_from_path(req.uri().path(), &prefix) else {
            return Err(reject(StatusCode::NOT_FOUND, "unknown session path"));
        };
        let identity = req
            .headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|header| identity_from_cookies(header, &cookie_name));
        let Some(identity) = identity else {
            return Err(reject(StatusCode::UNAUTHORIZED, "missing guest identity"));
        };
        handshake = Some((session_id, identity));
        Ok(response)
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!("WebSocket handshake with {} failed: {}", addr, e);
            return Ok(());
        }
    };
    let Some((session_id, identity)) = handshake else {
        return Ok(());
    };
    let (mut writer, mut reader) = ws_stream.split();

    let record = match ctx.store.get(&session_id).await {
        Ok(record) => record,
        Err(StoreError::NotFound(_)) => {
            tracing::warn!("{} asked for unknown session {}", identity, session_id);
            refuse(&mut writer, CloseCode::Policy, "session not found").await;
            return Ok(());
        }
        Err(e) => {
            refuse(&mut writer, CloseCode::Again, "store unavailable").await;
            return Err(e.into());
        }
    };
    let Some(side) = record.side_of(&identity) else {
        tracing::warn!("{} is not a member of session {}", identity, session_id);
        refuse(&mut writer, CloseCode::Policy, "not a member of this session").await;
        return Ok(());
    };

    // Create outbound queue for this client
    let (tx, rx) = mpsc::channel::<String>(ctx.config.outbound_queue_capacity.max(1));
    let client = ClientConnection::new(identity.clone(), side, tx, Arc::clone(&ctx.stats));
    let client_id = client.id();

    tracing::info!(
        "Client {} connected to session {} as {} ({})",
        identity,
        session_id,
        side,
        client_id
    );

    // Spawn writer task; from here on only the queue touches the socket
    let mut writer_handle = tokio::spawn(client_writer_task(writer, rx));
    client.try_send(&Envelope::signal("connected"));

    if let Err(e) = ctx.subscriptions.subscribe_if_absent(&session_id).await {
        writer_handle.abort();
        return Err(e.into());
    }

    ctx.registry.get_or_create(&session_id, &record.position).await;
    let outcome = ctx.registry.attach(&session_id, client.clone()).await;
    if !outcome.attached {
        tracing::info!(
            "{} already holds the {} slot of session {}, refusing connection {}",
            identity,
            side,
            session_id,
            client_id
        );
        client.try_send(&Envelope::signal("already connected, retry later"));
        ctx.subscriptions.release(&session_id).await;

        // Dropping the last sender lets the writer flush the signal and close
        drop(client);
        if tokio::time::timeout(DUPLICATE_FLUSH_TIMEOUT, &mut writer_handle)
            .await
            .is_err()
        {
            writer_handle.abort();
        }
        return Ok(());
    }
    if outcome.start != StartSignal::None {
        // Re-read: the cached record may predate moves made meanwhile
        let current = ctx.store.get(&session_id).await.unwrap_or(record);
        match outcome.start {
            StartSignal::First => {
                if let Err(e) = game::announce_start(&ctx, &current).await {
                    tracing::error!("Failed to publish start of session {}: {}", session_id, e);
                }
            }
            StartSignal::Resync => resync(&ctx, &client, &current).await,
            StartSignal::None => {}
        }
    }

    // Read and process messages
    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = process_message(&text, &client, &session_id, &ctx).await {
                        client.try_send(&reply);
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Client disconnected: {}", client_id);
                    break;
                }
                // Pings are answered by the transport; binary frames are not part of the protocol
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("Error reading from client {}: {}", client_id, e);
                    break;
                }
            },

            _ = &mut writer_handle => {
                tracing::info!("Writer for client {} stopped", client_id);
                break;
            }
        }
    }

    // Cleanup client
    ctx.registry.detach(&session_id, side, client_id).await;
    ctx.subscriptions.release(&session_id).await;
    writer_handle.abort();

    tracing::info!("Client handler finished: {}", client_id);

    Ok(())
}

/// Bring a returning player up to date with an already started game
async fn resync(
    ctx: &ServerContext,
    client: &ClientConnection,
    record: &crate::store::SessionRecord,
) {
    let payload = game::start_payload_for(record, client.side());
    if let Ok(envelope) = Envelope::new(MessageType::StartGame, &payload) {
        client.try_send(&envelope);
    }
    match game::time_snapshot(ctx, &record.session_id).await {
        Ok(times) => {
            if let Ok(envelope) = Envelope::new(MessageType::TimeSync, &times) {
                client.try_send(&envelope);
            }
        }
        Err(e) => tracing::error!("Failed to read clocks for resync: {}", e),
    }
}

/// Process one inbound text frame and return an optional direct reply
async fn process_message(
    text: &str,
    client: &ClientConnection,
    session_id: &str,
    ctx: &ServerContext,
) -> Option<Envelope> {
    let envelope = match parse_envelope(text, ctx.config.max_message_size) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Dropping message from {}: {}", client.id(), e);
            return None;
        }
    };

    match envelope.kind {
        MessageType::Move => {
            let payload: MovePayload = match parse_payload(&envelope) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("Dropping move from {}: {}", client.id(), e);
                    return None;
                }
            };
            match game::handle_move(ctx, session_id, client.identity(), &payload).await {
                Ok(MoveOutcome::Applied { first_move, ended }) => {
                    tracing::debug!(
                        "Applied {}{} in session {} (first: {}, ended: {})",
                        payload.from_square,
                        payload.to_square,
                        session_id,
                        first_move,
                        ended
                    );
                }
                Ok(MoveOutcome::TimedOut) | Ok(MoveOutcome::Rejected(_)) => {}
                Ok(MoveOutcome::Ignored(reason)) => {
                    tracing::debug!("Ignored move from {}: {}", client.identity(), reason);
                }
                Err(e) => {
                    tracing::error!("Move in session {} failed: {}", session_id, e);
                }
            }
            None
        }

        MessageType::TimeSync => match game::time_snapshot(ctx, session_id).await {
            Ok(times) => Envelope::new(MessageType::TimeSync, &times).ok(),
            Err(e) => {
                tracing::error!("Failed to read clocks for session {}: {}", session_id, e);
                None
            }
        },

        MessageType::Signal | MessageType::StartGame | MessageType::StartClock => {
            tracing::debug!(
                "Ignoring server-side message type {} from {}",
                envelope.kind.as_str(),
                client.id()
            );
            None
        }

        MessageType::Unknown => {
            tracing::debug!("Ignoring unknown message type from {}", client.id());
            None
        }
    }
}
