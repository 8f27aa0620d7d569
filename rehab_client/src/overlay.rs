use rehab_protocol::Keypoint;

pub const CANVAS_WIDTH: u32 = 320;
pub const CANVAS_HEIGHT: u32 = 240;

/// Named keypoint pairs drawn as line segments.
pub const BONES: [(&str, &str); 2] = [("shoulder", "elbow"), ("elbow", "wrist")];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: PixelPoint,
    pub to: PixelPoint,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Overlay {
    pub segments: Vec<Segment>,
    pub markers: Vec<PixelPoint>,
}

impl Overlay {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.markers.is_empty()
    }
}

/// Project a snapshot's keypoints onto the default 320x240 canvas.
pub fn project(keypoints: &[Keypoint]) -> Overlay {
    project_onto(keypoints, CANVAS_WIDTH, CANVAS_HEIGHT)
}

/// Stateless projection: normalized [0,1] coordinates scale to pixel space,
/// each bone pair becomes a segment when both endpoints are present, every
/// keypoint becomes a marker. No keypoints, no output.
pub fn project_onto(keypoints: &[Keypoint], width: u32, height: u32) -> Overlay {
    if keypoints.is_empty() {
        return Overlay::default();
    }

    let to_px = |k: &Keypoint| PixelPoint {
        x: k.x * f64::from(width),
        y: k.y * f64::from(height),
    };
    let named = |name: &str| keypoints.iter().find(|k| k.name == name);

    let mut segments = Vec::new();
    for (a, b) in BONES {
        if let (Some(ka), Some(kb)) = (named(a), named(b)) {
            segments.push(Segment {
                from: to_px(ka),
                to: to_px(kb),
            });
        }
    }

    Overlay {
        segments,
        markers: keypoints.iter().map(to_px).collect(),
    }
}
