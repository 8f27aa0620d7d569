use crate::frame::{encode_frame, FrameSource};
use crate::notice::{post, Notice, NoticeKind};
use crate::session::apply;
use crate::state::{StateEvent, TrackerState};
use futures_util::{SinkExt, StreamExt};
use rehab_protocol::{ClientMessage, Metrics};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use url::Url;

pub const FRAME_INTERVAL: Duration = Duration::from_millis(400);

#[derive(Debug)]
pub enum StreamCommand {
    Start { exercise: String },
    Stop,
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

enum Phase {
    Disconnected,
    Connecting { exercise: String },
    Streaming { socket: WsStream },
    Closing { socket: WsStream, teardown: bool },
}

enum Exit {
    /// Explicit stop: the END sentinel still has to go out.
    Stop,
    /// Socket error or peer close; the connection is already gone.
    Lost,
    /// Command channel dropped (UI teardown).
    Teardown,
}

/// Streaming client: one persistent socket per session, a fixed-cadence
/// frame push while it is up, inbound snapshots applied as they arrive.
/// Explicit stop, socket error and peer close all converge on the same
/// cleanup before the machine returns to Disconnected.
pub async fn run(
    mut rx: mpsc::Receiver<StreamCommand>,
    ws_url: Url,
    mut frames: Box<dyn FrameSource>,
    updates: watch::Sender<TrackerState>,
    notices: mpsc::UnboundedSender<Notice>,
) {
    let mut state = TrackerState::default();
    let mut phase = Phase::Disconnected;

    loop {
        phase = match phase {
            Phase::Disconnected => match rx.recv().await {
                Some(StreamCommand::Start { exercise }) => Phase::Connecting { exercise },
                Some(StreamCommand::Stop) => Phase::Disconnected,
                None => return,
            },
            Phase::Connecting { exercise } => {
                // One attempt; a refused connection surfaces immediately and
                // leaves the machine disconnected.
                match tokio_tungstenite::connect_async(ws_url.as_str()).await {
                    Ok((socket, _)) => {
                        info!(%exercise, "stream connected");
                        apply(&mut state, &updates, StateEvent::SessionStarted { exercise });
                        Phase::Streaming { socket }
                    }
                    Err(e) => {
                        warn!("stream connect failed: {e}");
                        post(
                            &notices,
                            NoticeKind::ConnectFailed,
                            format!("could not reach tracking backend: {e}"),
                        );
                        Phase::Disconnected
                    }
                }
            }
            Phase::Streaming { mut socket } => {
                match stream_until_exit(&mut rx, &mut socket, frames.as_mut(), &mut state, &updates)
                    .await
                {
                    Exit::Stop => Phase::Closing {
                        socket,
                        teardown: false,
                    },
                    Exit::Teardown => Phase::Closing {
                        socket,
                        teardown: true,
                    },
                    Exit::Lost => {
                        cleanup(&mut state, &updates);
                        Phase::Disconnected
                    }
                }
            }
            Phase::Closing { mut socket, teardown } => {
                // Best-effort sentinel; the socket may already be dead.
                let _ = send_json(&mut socket, &ClientMessage::end()).await;
                let _ = socket.close(None).await;
                cleanup(&mut state, &updates);
                if teardown {
                    return;
                }
                Phase::Disconnected
            }
        };
    }
}

async fn stream_until_exit(
    rx: &mut mpsc::Receiver<StreamCommand>,
    socket: &mut WsStream,
    frames: &mut dyn FrameSource,
    state: &mut TrackerState,
    updates: &watch::Sender<TrackerState>,
) -> Exit {
    let mut push = tokio::time::interval(FRAME_INTERVAL);
    push.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                // Latest start wins; the connection is already up.
                Some(StreamCommand::Start { exercise }) => {
                    apply(state, updates, StateEvent::SessionStarted { exercise });
                }
                Some(StreamCommand::Stop) => return Exit::Stop,
                None => return Exit::Teardown,
            },
            _ = push.tick() => {
                match frames.next_frame() {
                    Ok(frame) => match encode_frame(&frame) {
                        Ok(data_url) => {
                            debug!(bytes = data_url.len(), "pushing frame");
                            if send_json(socket, &ClientMessage::frame(data_url)).await.is_err() {
                                warn!("frame push failed, closing stream");
                                return Exit::Lost;
                            }
                        }
                        // Encode and capture failures skip the tick only.
                        Err(e) => warn!("frame encode failed: {e}"),
                    },
                    Err(e) => warn!("frame capture failed: {e}"),
                }
            }
            incoming = socket.next() => match incoming {
                Some(Ok(msg)) => {
                    if let Ok(text) = msg.into_text() {
                        match serde_json::from_str::<Metrics>(&text) {
                            // Wholesale replacement, applied atomically.
                            Ok(metrics) => apply(state, updates, StateEvent::MetricsReplaced(metrics)),
                            // Malformed payloads are dropped; the connection stays up.
                            Err(e) => warn!("discarding malformed metrics payload: {e}"),
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!("stream socket error: {e}");
                    return Exit::Lost;
                }
                None => {
                    info!("stream closed by backend");
                    return Exit::Lost;
                }
            },
        }
    }
}

/// The single cleanup routine every exit path converges on.
fn cleanup(state: &mut TrackerState, updates: &watch::Sender<TrackerState>) {
    apply(state, updates, StateEvent::SessionCleared);
}

async fn send_json(socket: &mut WsStream, msg: &ClientMessage) -> Result<(), ()> {
    let payload = serde_json::to_string(msg).map_err(|_| ())?;
    socket
        .send(tokio_tungstenite::tungstenite::Message::Text(payload.into()))
        .await
        .map_err(|_| ())
}
