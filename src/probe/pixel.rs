//! Colour-sampling probe over captured frames

use super::error::{ProbeError, ProbeResult};
use super::ScreenProbe;
use crate::queue::{DetectionRegion, MatchCriteria};
use image::RgbaImage;
use std::future::Future;
use std::path::PathBuf;

/// Something that can hand out the current screen contents as an RGBA frame
pub trait FrameSource: Send + Sync + 'static {
    fn grab(&self) -> impl Future<Output = ProbeResult<RgbaImage>> + Send;
}

/// Reads the frame from an image file that an external capture tool keeps refreshing
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl FrameSource for FileFrameSource {
    async fn grab(&self) -> ProbeResult<RgbaImage> {
        let path = self.path.clone();
        // Decoding is CPU bound, keep it off the runtime threads
        let frame = tokio::task::spawn_blocking(move || image::open(&path)).await??;
        Ok(frame.to_rgba8())
    }
}

pub struct PixelProbe<F: FrameSource> {
    source: F,
}

impl<F: FrameSource> PixelProbe<F> {
    pub fn new(source: F) -> Self {
        Self { source }
    }
}

impl<F: FrameSource> ScreenProbe for PixelProbe<F> {
    async fn observe(&self, region: DetectionRegion, criteria: MatchCriteria) -> ProbeResult<bool> {
        let frame = self.source.grab().await?;
        region_matches(&frame, region, criteria)
    }
}

/// Check whether enough pixels inside `region` are close to the target colour.
///
/// The region is clipped to the frame; a region with no overlap is an error
/// rather than a negative verdict so a bad calibration shows up in the logs.
pub fn region_matches(
    frame: &RgbaImage,
    region: DetectionRegion,
    criteria: MatchCriteria,
) -> ProbeResult<bool> {
    let (frame_w, frame_h) = frame.dimensions();
    let x0 = region.x.max(0) as i64;
    let y0 = region.y.max(0) as i64;
    let x1 = (region.x as i64 + region.width as i64).min(frame_w as i64);
    let y1 = (region.y as i64 + region.height as i64).min(frame_h as i64);

    if x0 >= x1 || y0 >= y1 {
        return Err(ProbeError::RegionOutsideFrame {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            frame_width: frame_w,
            frame_height: frame_h,
        });
    }

    let tol = criteria.tolerance as i16;
    let mut total: u64 = 0;
    let mut matching: u64 = 0;
    for y in y0..y1 {
        for x in x0..x1 {
            let px = frame.get_pixel(x as u32, y as u32);
            total += 1;
            if (px[0] as i16 - criteria.r as i16).abs() <= tol
                && (px[1] as i16 - criteria.g as i16).abs() <= tol
                && (px[2] as i16 - criteria.b as i16).abs() <= tol
            {
                matching += 1;
            }
        }
    }

    let fraction = matching as f32 / total as f32;
    log::trace!(
        "probe region [{},{},{},{}]: {}/{} pixels match ({:.2})",
        region.x,
        region.y,
        region.width,
        region.height,
        matching,
        total,
        fraction
    );
    Ok(fraction >= criteria.min_fraction)
}
