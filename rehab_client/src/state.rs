use rehab_protocol::Metrics;

/// Captured or picked media, held only long enough to preview and upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// The one mutable UI-state bundle. Mutated only through [`reduce`], so every
/// observer sees whole snapshots and never a partial update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackerState {
    pub exercise: Option<String>,
    pub active: bool,
    pub metrics: Option<Metrics>,
    pub media: Option<MediaRef>,
    pub processing: bool,
}

#[derive(Debug, Clone)]
pub enum StateEvent {
    SessionStarted { exercise: String },
    SessionCleared,
    MetricsReplaced(Metrics),
    MediaAttached(MediaRef),
    AnalysisStarted,
    AnalysisFinished(Metrics),
    AnalysisFailed,
}

/// Pure transition function from (old state, event) to new state.
pub fn reduce(state: &TrackerState, event: StateEvent) -> TrackerState {
    let mut next = state.clone();
    match event {
        // Starting while already active is not guarded; the latest start wins.
        StateEvent::SessionStarted { exercise } => {
            next.exercise = Some(exercise);
            next.active = true;
        }
        // The single cleanup transition every exit path converges on.
        StateEvent::SessionCleared => {
            next.exercise = None;
            next.active = false;
            next.metrics = None;
            next.media = None;
            next.processing = false;
        }
        // Live metrics only exist while a session is active; a response that
        // lands after teardown must not mutate anything.
        StateEvent::MetricsReplaced(metrics) => {
            if next.active {
                next.metrics = Some(metrics);
            }
        }
        StateEvent::MediaAttached(media) => {
            next.media = Some(media);
        }
        StateEvent::AnalysisStarted => {
            next.processing = true;
        }
        // One-shot analysis does not need a session.
        StateEvent::AnalysisFinished(metrics) => {
            next.metrics = Some(metrics);
            next.processing = false;
        }
        StateEvent::AnalysisFailed => {
            next.processing = false;
        }
    }
    next
}
