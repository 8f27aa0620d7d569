use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use rehab_protocol::{ClientMessage, Keypoint, Metrics, StartSessionRequest};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "mock_backend")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:0")]
    addr: String,

    /// Write the bound address to this file once listening.
    #[arg(long, value_name = "PATH")]
    addr_file: Option<PathBuf>,

    #[arg(long)]
    run_for_ms: Option<u64>,
}

/// Scripted rep cycle standing in for the pose pipeline: the angle sweeps
/// between flexion and extension, stage flips across the 160/50 thresholds,
/// the counter increments on each down->up transition and form goes bad
/// outside the 30..=170 band.
struct RepScript {
    angle: f64,
    falling: bool,
    stage: Option<String>,
    counter: u32,
}

impl RepScript {
    fn new() -> Self {
        Self {
            angle: 175.0,
            falling: true,
            stage: None,
            counter: 0,
        }
    }

    fn advance(&mut self) -> Metrics {
        if self.falling {
            self.angle -= 25.0;
            if self.angle <= 25.0 {
                self.falling = false;
            }
        } else {
            self.angle += 25.0;
            if self.angle >= 175.0 {
                self.falling = true;
            }
        }

        if self.angle > 160.0 {
            self.stage = Some("down".to_string());
        }
        if self.angle < 50.0 && self.stage.as_deref() == Some("down") {
            self.stage = Some("up".to_string());
            self.counter += 1;
        }
        let form = if self.angle < 30.0 || self.angle > 170.0 {
            "bad"
        } else {
            "good"
        };

        Metrics {
            angle: self.angle,
            count: self.counter,
            stage: self.stage.clone(),
            form: form.to_string(),
            keypoints: Vec::new(),
        }
    }
}

struct Backend {
    exercise: Mutex<Option<String>>,
    script: Mutex<RepScript>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let backend = Arc::new(Backend {
        exercise: Mutex::new(None),
        script: Mutex::new(RepScript::new()),
    });

    let app = Router::new()
        .route("/start_exercise", post(start_exercise))
        .route("/start_session", post(start_session))
        .route("/stop", post(stop))
        .route("/stop_session", post(stop))
        .route("/data", get(data))
        .route("/analyze_frame", post(analyze_frame))
        .route("/ws/track", get(ws_track))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    let addr = listener.local_addr()?;
    if let Some(path) = &args.addr_file {
        let _ = std::fs::write(path, addr.to_string());
    }
    println!("mock_backend listening on http://{addr}");

    match args.run_for_ms {
        Some(ms) => {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                })
                .await?
        }
        None => axum::serve(listener, app).await?,
    }

    Ok(())
}

async fn start_exercise(
    State(backend): State<Arc<Backend>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let name = query
        .get("name")
        .cloned()
        .ok_or(StatusCode::UNPROCESSABLE_ENTITY)?;
    begin(&backend, name.clone());
    Ok(Json(json!({ "status": "started", "exercise": name })))
}

async fn start_session(
    State(backend): State<Arc<Backend>>,
    Json(req): Json<StartSessionRequest>,
) -> Json<serde_json::Value> {
    begin(&backend, req.exercise.clone());
    Json(json!({ "status": "started", "exercise": req.exercise, "user_id": req.user_id }))
}

fn begin(backend: &Backend, exercise: String) {
    *backend.exercise.lock().expect("exercise lock") = Some(exercise);
    *backend.script.lock().expect("script lock") = RepScript::new();
}

async fn stop(State(backend): State<Arc<Backend>>) -> Json<serde_json::Value> {
    *backend.exercise.lock().expect("exercise lock") = None;
    Json(json!({ "status": "stopped" }))
}

async fn data(State(backend): State<Arc<Backend>>) -> Json<Metrics> {
    Json(backend.script.lock().expect("script lock").advance())
}

async fn analyze_frame(
    State(backend): State<Arc<Backend>>,
    mut multipart: Multipart,
) -> Result<Json<Metrics>, StatusCode> {
    let mut received = 0usize;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() == Some("file") {
            received = field
                .bytes()
                .await
                .map_err(|_| StatusCode::BAD_REQUEST)?
                .len();
        }
    }
    if received == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut metrics = backend.script.lock().expect("script lock").advance();
    metrics.keypoints = vec![
        Keypoint {
            name: "shoulder".to_string(),
            x: 0.5,
            y: 0.5,
        },
        Keypoint {
            name: "elbow".to_string(),
            x: 0.6,
            y: 0.5,
        },
        Keypoint {
            name: "wrist".to_string(),
            x: 0.7,
            y: 0.5,
        },
    ];
    Ok(Json(metrics))
}

async fn ws_track(State(backend): State<Arc<Backend>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| track(socket, backend))
}

async fn track(mut socket: WebSocket, backend: Arc<Backend>) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let Ok(parsed) = serde_json::from_str::<ClientMessage>(&text) else {
            continue;
        };
        match parsed {
            ClientMessage::Control { .. } => break,
            ClientMessage::Frame { .. } => {
                let metrics = backend.script.lock().expect("script lock").advance();
                // The live endpoint spells the rep count "counter".
                let payload = json!({
                    "angle": metrics.angle,
                    "stage": metrics.stage,
                    "counter": metrics.count,
                    "form": metrics.form,
                });
                if socket.send(Message::Text(payload.to_string())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}
