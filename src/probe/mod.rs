// Screen probe - answers "is the match-found cue visible in this region?"
// The detection loop only consumes the boolean verdict.

pub mod error;
pub mod pixel;


pub use error::{ProbeError, ProbeResult};
pub use pixel::{FileFrameSource, FrameSource, PixelProbe, region_matches};

use crate::queue::{DetectionRegion, MatchCriteria};
use std::future::Future;

/// Source of match-found verdicts for a screen region.
///
/// Implementations must be side-effect free; they may be slow, so the
/// returned future is awaited without blocking the controller.
pub trait ScreenProbe: Send + Sync + 'static {
    fn observe(
        &self,
        region: DetectionRegion,
        criteria: MatchCriteria,
    ) -> impl Future<Output = ProbeResult<bool>> + Send;
}
