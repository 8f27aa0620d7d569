use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend rejected request: status={status} body={body}")]
    BadStatus { status: StatusCode, body: String },
    #[error("image encode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("capture failed: {0}")]
    Capture(String),
}
