use crate::error::ClientError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};

/// Streamed frames are downsized to this width before encoding.
pub const STREAM_FRAME_WIDTH: u32 = 256;
pub const JPEG_QUALITY: u8 = 70;
pub const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Camera boundary for the streaming variant. One raw frame per call; the
/// device itself is on the other side.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<RgbImage, ClientError>;
}

/// Downsize, JPEG-encode and base64-wrap one frame for the socket. Pure:
/// the same frame always yields the same data URL.
pub fn encode_frame(frame: &RgbImage) -> Result<String, ClientError> {
    let scaled = downscale(frame);
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder.encode(
        scaled.as_raw(),
        scaled.width(),
        scaled.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(format!("{DATA_URL_PREFIX}{}", STANDARD.encode(&jpeg)))
}

fn downscale(frame: &RgbImage) -> RgbImage {
    if frame.width() == STREAM_FRAME_WIDTH {
        return frame.clone();
    }
    let height = ((u64::from(frame.height()) * u64::from(STREAM_FRAME_WIDTH))
        / u64::from(frame.width().max(1)))
    .max(1) as u32;
    image::imageops::resize(
        frame,
        STREAM_FRAME_WIDTH,
        height,
        image::imageops::FilterType::Triangle,
    )
}
