use crate::capture::{self, Camera};
use crate::error::ClientError;
use crate::notice::{post, Notice, NoticeKind};
use crate::rest::RestClient;
use crate::state::{reduce, MediaRef, StateEvent, TrackerState};
use rehab_protocol::Metrics;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum SessionCommand {
    Start { exercise: String },
    Stop,
    AnalyzeVideo(MediaRef),
    CaptureStill,
}

enum Fetched {
    Poll(Result<Metrics, ClientError>),
    Analysis(Result<Metrics, ClientError>),
}

/// Session controller for the polling variants: owns the tracker state,
/// gates the 1-second poll loop on the active flag and runs the one-shot
/// analysis flow. Drops of the command sender end the actor; after that no
/// state update is ever delivered.
pub async fn run(
    mut rx: mpsc::Receiver<SessionCommand>,
    rest: RestClient,
    mut camera: Box<dyn Camera>,
    updates: watch::Sender<TrackerState>,
    notices: mpsc::UnboundedSender<Notice>,
) {
    let mut state = TrackerState::default();
    let (fetched_tx, mut fetched_rx) = mpsc::unbounded_channel::<Fetched>();

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(SessionCommand::Start { exercise }) => {
                    // One attempt; a failed start leaves no session active.
                    match rest.start(&exercise).await {
                        Ok(()) => {
                            info!(%exercise, "session started");
                            apply(&mut state, &updates, StateEvent::SessionStarted { exercise });
                            poll.reset();
                        }
                        Err(e) => {
                            warn!("session start failed: {e}");
                            post(&notices, NoticeKind::StartFailed, format!("could not start session: {e}"));
                        }
                    }
                }
                Some(SessionCommand::Stop) => {
                    // Local cleanup happens whether or not the request lands;
                    // the client never sticks in "tracking".
                    if let Err(e) = rest.stop().await {
                        warn!("stop request failed, clearing local state anyway: {e}");
                    }
                    info!("session stopped");
                    apply(&mut state, &updates, StateEvent::SessionCleared);
                }
                Some(SessionCommand::AnalyzeVideo(media)) => {
                    apply(&mut state, &updates, StateEvent::MediaAttached(media.clone()));
                    apply(&mut state, &updates, StateEvent::AnalysisStarted);
                    spawn_analysis(&rest, media, &fetched_tx);
                }
                Some(SessionCommand::CaptureStill) => {
                    match capture::capture_with_permission(camera.as_mut()) {
                        Ok(media) => {
                            apply(&mut state, &updates, StateEvent::MediaAttached(media.clone()));
                            apply(&mut state, &updates, StateEvent::AnalysisStarted);
                            spawn_analysis(&rest, media, &fetched_tx);
                        }
                        Err(ClientError::PermissionDenied) => {
                            post(&notices, NoticeKind::PermissionDenied, "camera access was denied".to_string());
                        }
                        Err(e) => {
                            warn!("still capture failed: {e}");
                            post(&notices, NoticeKind::AnalysisFailed, format!("capture failed: {e}"));
                        }
                    }
                }
                None => return,
            },
            fetched = fetched_rx.recv() => match fetched {
                Some(Fetched::Poll(Ok(metrics))) => {
                    // The reducer discards this when the session is no longer
                    // active, so a response landing after Stop mutates nothing.
                    apply(&mut state, &updates, StateEvent::MetricsReplaced(metrics));
                }
                Some(Fetched::Poll(Err(e))) => {
                    // A failed tick does not stop subsequent ticks.
                    warn!("poll tick failed: {e}");
                }
                Some(Fetched::Analysis(Ok(metrics))) => {
                    apply(&mut state, &updates, StateEvent::AnalysisFinished(metrics));
                }
                Some(Fetched::Analysis(Err(e))) => {
                    warn!("analysis failed: {e}");
                    apply(&mut state, &updates, StateEvent::AnalysisFailed);
                    post(&notices, NoticeKind::AnalysisFailed, format!("analysis failed: {e}"));
                }
                // fetched_tx lives in this scope, so the channel cannot close.
                None => return,
            },
            _ = poll.tick(), if state.active => {
                // Each tick fetches independently; nothing orders overlapping
                // responses, so the last arrival wins.
                let rest = rest.clone();
                let tx = fetched_tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(Fetched::Poll(rest.latest_metrics().await));
                });
            }
        }
    }
}

fn spawn_analysis(rest: &RestClient, media: MediaRef, tx: &mpsc::UnboundedSender<Fetched>) {
    let rest = rest.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let _ = tx.send(Fetched::Analysis(rest.analyze(&media).await));
    });
}

pub(crate) fn apply(
    state: &mut TrackerState,
    updates: &watch::Sender<TrackerState>,
    event: StateEvent,
) {
    let next = reduce(state, event);
    if next != *state {
        *state = next;
        let _ = updates.send(state.clone());
    }
}
