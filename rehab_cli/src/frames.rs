use image::RgbImage;
use rehab_client::{Camera, ClientError, FrameSource, MediaRef, Permission};
use std::path::{Path, PathBuf};

/// Cycles through the image files of a directory in name order, standing in
/// for a live camera feed.
pub struct DirFrames {
    paths: Vec<PathBuf>,
    next: usize,
}

impl DirFrames {
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("jpg") | Some("jpeg") | Some("png")
                )
            })
            .collect();
        paths.sort();
        anyhow::ensure!(!paths.is_empty(), "no image frames in {}", dir.display());
        Ok(Self { paths, next: 0 })
    }
}

impl FrameSource for DirFrames {
    fn next_frame(&mut self) -> Result<RgbImage, ClientError> {
        let path = self.paths[self.next].clone();
        self.next = (self.next + 1) % self.paths.len();
        Ok(image::open(&path)?.to_rgb8())
    }
}

/// Moving-gradient frames for runs without any image material.
#[derive(Default)]
pub struct SyntheticFrames {
    tick: u32,
}

impl FrameSource for SyntheticFrames {
    fn next_frame(&mut self) -> Result<RgbImage, ClientError> {
        self.tick = self.tick.wrapping_add(1);
        let t = self.tick;
        Ok(RgbImage::from_fn(320, 240, move |x, y| {
            image::Rgb([
                x.wrapping_add(t) as u8,
                y.wrapping_add(t) as u8,
                (x ^ y) as u8,
            ])
        }))
    }
}

/// The poll variant runs without a camera; any capture attempt is refused.
pub struct NoCamera;

impl Camera for NoCamera {
    fn permission(&self) -> Permission {
        Permission::Denied
    }

    fn request_permission(&mut self) -> Permission {
        Permission::Denied
    }

    fn capture_still(&mut self) -> Result<MediaRef, ClientError> {
        Err(ClientError::Capture("no camera device attached".to_string()))
    }
}
