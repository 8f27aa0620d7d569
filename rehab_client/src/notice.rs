use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    StartFailed,
    ConnectFailed,
    PermissionDenied,
    AnalysisFailed,
}

/// A user-facing failure report, the headless analog of a blocking alert.
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

pub(crate) fn post(notices: &mpsc::UnboundedSender<Notice>, kind: NoticeKind, message: String) {
    let _ = notices.send(Notice { kind, message });
}
