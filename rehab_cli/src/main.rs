mod frames;

use clap::{Parser, Subcommand};
use rehab_client::{
    Endpoints, FrameSource, MediaRef, RestClient, SessionCommand, StreamCommand, TrackerState,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;
use url::Url;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/ws/track";

#[derive(Parser, Debug)]
#[command(name = "rehab_cli")]
struct Args {
    /// Backend base URL (falls back to REHAB_BACKEND_URL).
    #[arg(long)]
    backend_url: Option<String>,

    /// Tracking socket URL (falls back to REHAB_WS_URL).
    #[arg(long)]
    ws_url: Option<String>,

    /// When set, session start/stop use the identity-aware endpoints.
    #[arg(long)]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a named exercise session and print each polled snapshot.
    Poll {
        #[arg(long)]
        exercise: String,

        #[arg(long, default_value_t = 30)]
        run_for_secs: u64,
    },
    /// Upload a video or image for one-shot analysis and print the result.
    Analyze {
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },
    /// Stream frames over the tracking socket and print inbound snapshots.
    Stream {
        #[arg(long)]
        exercise: String,

        /// Directory of jpg/png frames cycled in name order; synthetic
        /// frames are generated when omitted.
        #[arg(long, value_name = "DIR")]
        frames_dir: Option<PathBuf>,

        #[arg(long, default_value_t = 30)]
        run_for_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let endpoints = resolve_endpoints(&args)?;

    match args.command {
        Command::Poll {
            exercise,
            run_for_secs,
        } => poll(endpoints, exercise, run_for_secs).await,
        Command::Analyze { file } => analyze(endpoints, file).await,
        Command::Stream {
            exercise,
            frames_dir,
            run_for_secs,
        } => stream(endpoints, exercise, frames_dir, run_for_secs).await,
    }
}

fn resolve_endpoints(args: &Args) -> anyhow::Result<Endpoints> {
    let base = args
        .backend_url
        .clone()
        .or_else(|| std::env::var("REHAB_BACKEND_URL").ok())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
    let ws = args
        .ws_url
        .clone()
        .or_else(|| std::env::var("REHAB_WS_URL").ok())
        .unwrap_or_else(|| DEFAULT_WS_URL.to_string());

    Ok(Endpoints {
        base_url: Url::parse(&base)
            .map_err(|e| anyhow::anyhow!("invalid backend url {base}: {e}"))?,
        ws_url: Url::parse(&ws).map_err(|e| anyhow::anyhow!("invalid ws url {ws}: {e}"))?,
        user_id: args.user_id.clone(),
    })
}

async fn poll(endpoints: Endpoints, exercise: String, run_for_secs: u64) -> anyhow::Result<()> {
    let rest = RestClient::new(endpoints);
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (state_tx, mut state_rx) = watch::channel(TrackerState::default());
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();

    let actor = tokio::spawn(rehab_client::session::run(
        cmd_rx,
        rest,
        Box::new(frames::NoCamera),
        state_tx,
        notice_tx,
    ));

    cmd_tx
        .send(SessionCommand::Start { exercise })
        .await
        .map_err(|_| anyhow::anyhow!("session actor unavailable"))?;

    let deadline = tokio::time::sleep(Duration::from_secs(run_for_secs));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                print_snapshot(&state_rx.borrow());
            }
            notice = notice_rx.recv() => {
                if let Some(n) = notice {
                    eprintln!("notice: {}", n.message);
                    break;
                }
            }
        }
    }

    let _ = cmd_tx.send(SessionCommand::Stop).await;
    drop(cmd_tx);
    let _ = actor.await;
    Ok(())
}

async fn analyze(endpoints: Endpoints, file: PathBuf) -> anyhow::Result<()> {
    let bytes = std::fs::read(&file)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;
    let media = MediaRef {
        file_name: file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string()),
        mime: mime_for(&file),
        bytes,
    };

    let rest = RestClient::new(endpoints);
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (state_tx, mut state_rx) = watch::channel(TrackerState::default());
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();

    let actor = tokio::spawn(rehab_client::session::run(
        cmd_rx,
        rest,
        Box::new(frames::NoCamera),
        state_tx,
        notice_tx,
    ));

    cmd_tx
        .send(SessionCommand::AnalyzeVideo(media))
        .await
        .map_err(|_| anyhow::anyhow!("session actor unavailable"))?;

    let metrics = loop {
        tokio::select! {
            changed = state_rx.changed() => {
                anyhow::ensure!(changed.is_ok(), "session actor ended unexpectedly");
                let snapshot = state_rx.borrow().clone();
                if !snapshot.processing {
                    if let Some(metrics) = snapshot.metrics {
                        break metrics;
                    }
                }
            }
            notice = notice_rx.recv() => {
                if let Some(n) = notice {
                    anyhow::bail!("{}", n.message);
                }
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&metrics)?);
    if !metrics.keypoints.is_empty() {
        let overlay = rehab_client::overlay::project(&metrics.keypoints);
        eprintln!("overlay:");
        for s in &overlay.segments {
            eprintln!(
                "  segment ({:.0},{:.0}) -> ({:.0},{:.0})",
                s.from.x, s.from.y, s.to.x, s.to.y
            );
        }
        for m in &overlay.markers {
            eprintln!("  marker ({:.0},{:.0})", m.x, m.y);
        }
    }

    drop(cmd_tx);
    let _ = actor.await;
    Ok(())
}

async fn stream(
    endpoints: Endpoints,
    exercise: String,
    frames_dir: Option<PathBuf>,
    run_for_secs: u64,
) -> anyhow::Result<()> {
    let source: Box<dyn FrameSource> = match frames_dir {
        Some(dir) => Box::new(frames::DirFrames::open(&dir)?),
        None => Box::new(frames::SyntheticFrames::default()),
    };

    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (state_tx, mut state_rx) = watch::channel(TrackerState::default());
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();

    let actor = tokio::spawn(rehab_client::stream::run(
        cmd_rx,
        endpoints.ws_url.clone(),
        source,
        state_tx,
        notice_tx,
    ));

    cmd_tx
        .send(StreamCommand::Start { exercise })
        .await
        .map_err(|_| anyhow::anyhow!("stream actor unavailable"))?;

    let deadline = tokio::time::sleep(Duration::from_secs(run_for_secs));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state_rx.borrow().clone();
                if !snapshot.active && snapshot.metrics.is_none() && snapshot.exercise.is_none() {
                    // Backend closed the stream; nothing more will arrive.
                    eprintln!("stream ended");
                    break;
                }
                print_snapshot(&snapshot);
            }
            notice = notice_rx.recv() => {
                if let Some(n) = notice {
                    anyhow::bail!("{}", n.message);
                }
            }
        }
    }

    let _ = cmd_tx.send(StreamCommand::Stop).await;
    drop(cmd_tx);
    let _ = actor.await;
    Ok(())
}

fn print_snapshot(state: &TrackerState) {
    let Some(metrics) = &state.metrics else { return };
    println!(
        "exercise={} angle={:.1} count={} stage={} form={}",
        state.exercise.as_deref().unwrap_or("-"),
        metrics.angle,
        metrics.count,
        metrics.stage.as_deref().unwrap_or("-"),
        metrics.form,
    );
}

fn mime_for(path: &std::path::Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
    .to_string()
}
