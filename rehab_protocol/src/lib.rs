use serde::{Deserialize, Serialize};

/// One named pose landmark in normalized [0,1] image coordinates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Keypoint {
    pub name: String,
    pub x: f64,
    pub y: f64,
}

/// Latest computed metrics for the running exercise. Replaced wholesale on
/// every poll response or inbound socket message; never merged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Metrics {
    pub angle: f64,
    // The streaming backend spells this "counter"; the REST endpoint "count".
    #[serde(alias = "counter")]
    pub count: u32,
    pub stage: Option<String>,
    #[serde(default)]
    pub form: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keypoints: Vec<Keypoint>,
}

impl Metrics {
    pub fn keypoint(&self, name: &str) -> Option<&Keypoint> {
        self.keypoints.iter().find(|k| k.name == name)
    }
}

/// Body of `POST /start_session` (the identity-aware start dialect).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StartSessionRequest {
    pub exercise: String,
    pub user_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    #[serde(rename = "END")]
    End,
}

/// Messages the client pushes over `/ws/track`. Untagged on the wire: a
/// frame message is `{"frame": "..."}`, the termination sentinel is
/// `{"type":"END"}`. The control variant must stay listed first so the
/// sentinel is not swallowed by the frame arm.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ClientMessage {
    Control {
        #[serde(rename = "type")]
        kind: ControlKind,
    },
    Frame {
        frame: String,
    },
}

impl ClientMessage {
    pub fn end() -> Self {
        ClientMessage::Control {
            kind: ControlKind::End,
        }
    }

    pub fn frame(data_url: String) -> Self {
        ClientMessage::Frame { frame: data_url }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, ClientMessage::Control { kind: ControlKind::End })
    }
}
