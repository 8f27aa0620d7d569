use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::RgbImage;
use rehab_client::frame::DATA_URL_PREFIX;
use rehab_client::{
    ClientError, FrameSource, Notice, NoticeKind, StreamCommand, TrackerState,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use url::Url;

const WAIT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, PartialEq)]
enum Behavior {
    /// One well-formed snapshot per inbound frame.
    Echo,
    /// Frame 1 gets a valid snapshot, frame 2 gets garbage, the rest are
    /// answered normally again.
    GarbageOnSecondFrame,
    /// Close the connection right after the first frame.
    CloseAfterFirstFrame,
}

struct MockTracker {
    behavior: Behavior,
    frames: Mutex<Vec<String>>,
    got_end: AtomicBool,
}

async fn ws_track(State(mock): State<Arc<MockTracker>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| track(socket, mock))
}

async fn track(mut socket: WebSocket, mock: Arc<MockTracker>) {
    let mut frames_seen = 0usize;
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
            continue;
        };
        if value.get("type").and_then(|t| t.as_str()) == Some("END") {
            mock.got_end.store(true, Ordering::SeqCst);
            break;
        }
        let Some(frame) = value.get("frame").and_then(|f| f.as_str()) else {
            continue;
        };
        mock.frames
            .lock()
            .expect("frames lock")
            .push(frame.to_string());
        frames_seen += 1;

        let reply = match mock.behavior {
            Behavior::Echo => Some(snapshot(frames_seen)),
            Behavior::GarbageOnSecondFrame if frames_seen == 2 => {
                Some("{not json at all".to_string())
            }
            Behavior::GarbageOnSecondFrame => Some(snapshot(frames_seen)),
            Behavior::CloseAfterFirstFrame => None,
        };
        match reply {
            Some(payload) => {
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            None => break,
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}

fn snapshot(n: usize) -> String {
    // The live endpoint spells the rep count "counter".
    json!({ "angle": 40.0 + n as f64, "stage": "up", "counter": n, "form": "good" }).to_string()
}

async fn spawn_tracker(behavior: Behavior) -> (Url, Arc<MockTracker>) {
    let mock = Arc::new(MockTracker {
        behavior,
        frames: Mutex::new(Vec::new()),
        got_end: AtomicBool::new(false),
    });
    let app = Router::new()
        .route("/ws/track", get(ws_track))
        .with_state(Arc::clone(&mock));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock tracker");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let url = Url::parse(&format!("ws://{addr}/ws/track")).expect("ws url");
    (url, mock)
}

struct SolidFrames;

impl FrameSource for SolidFrames {
    fn next_frame(&mut self) -> Result<RgbImage, ClientError> {
        Ok(RgbImage::from_pixel(64, 48, image::Rgb([40, 120, 200])))
    }
}

struct Harness {
    cmd: mpsc::Sender<StreamCommand>,
    state: watch::Receiver<TrackerState>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

fn spawn_stream(ws_url: Url) -> Harness {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (state_tx, state_rx) = watch::channel(TrackerState::default());
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    tokio::spawn(rehab_client::stream::run(
        cmd_rx,
        ws_url,
        Box::new(SolidFrames),
        state_tx,
        notice_tx,
    ));
    Harness {
        cmd: cmd_tx,
        state: state_rx,
        notices: notice_rx,
    }
}

async fn wait_state<F>(harness: &mut Harness, cond: F) -> TrackerState
where
    F: FnMut(&TrackerState) -> bool,
{
    tokio::time::timeout(WAIT, harness.state.wait_for(cond))
        .await
        .expect("timed out waiting for state")
        .expect("stream actor gone")
        .clone()
}

#[tokio::test]
async fn stream_round_trip_pushes_jpeg_frames_and_applies_snapshots() {
    let (url, mock) = spawn_tracker(Behavior::Echo).await;
    let mut harness = spawn_stream(url);

    harness
        .cmd
        .send(StreamCommand::Start {
            exercise: "bicep_curl".to_string(),
        })
        .await
        .expect("send start");

    let started = wait_state(&mut harness, |s| s.active).await;
    assert_eq!(started.exercise.as_deref(), Some("bicep_curl"));

    let tracking = wait_state(&mut harness, |s| {
        s.metrics.as_ref().map(|m| m.count).unwrap_or(0) >= 2
    })
    .await;
    assert_eq!(
        tracking.metrics.as_ref().expect("metrics").form,
        "good".to_string()
    );

    // Every pushed frame is a base64 jpeg data URL downsized for the wire.
    let frames = mock.frames.lock().expect("frames lock").clone();
    assert!(frames.len() >= 2);
    for frame in &frames {
        let payload = frame.strip_prefix(DATA_URL_PREFIX).expect("data url");
        let jpeg = STANDARD.decode(payload).expect("valid base64");
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "jpeg magic");
    }

    harness
        .cmd
        .send(StreamCommand::Stop)
        .await
        .expect("send stop");
    let stopped = wait_state(&mut harness, |s| !s.active).await;
    assert_eq!(stopped, TrackerState::default());

    tokio::time::timeout(WAIT, async {
        while !mock.got_end.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("END sentinel never arrived");
}

#[tokio::test]
async fn malformed_inbound_payload_is_dropped_without_closing() {
    let (url, mock) = spawn_tracker(Behavior::GarbageOnSecondFrame).await;
    let mut harness = spawn_stream(url);

    harness
        .cmd
        .send(StreamCommand::Start {
            exercise: "squat".to_string(),
        })
        .await
        .expect("send start");

    // Snapshots from frames 1 and 3 arrive; the garbage in between leaves
    // the previous snapshot intact and the connection up.
    let after_garbage = wait_state(&mut harness, |s| {
        s.metrics.as_ref().map(|m| m.count).unwrap_or(0) >= 3
    })
    .await;
    assert!(after_garbage.active);
    assert!(mock.frames.lock().expect("frames lock").len() >= 3);
}

#[tokio::test]
async fn backend_close_resets_state_to_not_tracking() {
    let (url, _mock) = spawn_tracker(Behavior::CloseAfterFirstFrame).await;
    let mut harness = spawn_stream(url);

    harness
        .cmd
        .send(StreamCommand::Start {
            exercise: "leg_raise".to_string(),
        })
        .await
        .expect("send start");
    wait_state(&mut harness, |s| s.active).await;

    // The peer closes after the first frame; the one cleanup path runs.
    let cleared = wait_state(&mut harness, |s| !s.active).await;
    assert_eq!(cleared, TrackerState::default());
}

#[tokio::test]
async fn connect_failure_surfaces_a_notice_and_stays_disconnected() {
    // Grab a free port, then close the listener so nothing answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let url = Url::parse(&format!("ws://{addr}/ws/track")).expect("ws url");
    let mut harness = spawn_stream(url);

    harness
        .cmd
        .send(StreamCommand::Start {
            exercise: "side_bend".to_string(),
        })
        .await
        .expect("send start");

    let notice = tokio::time::timeout(WAIT, harness.notices.recv())
        .await
        .expect("timed out waiting for notice")
        .expect("notice channel closed");
    assert_eq!(notice.kind, NoticeKind::ConnectFailed);
    assert_eq!(*harness.state.borrow(), TrackerState::default());
}
