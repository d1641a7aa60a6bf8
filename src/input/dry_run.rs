use super::{InputExecutor, InputResult};
use std::sync::atomic::{AtomicU64, Ordering};

/// Logs clicks instead of performing them. Used with `--dry-run` and on
/// builds without the `desktop-input` feature.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    clicks: AtomicU64,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn click_count(&self) -> u64 {
        self.clicks.load(Ordering::Relaxed)
    }
}

impl InputExecutor for DryRunExecutor {
    async fn click(&self, x: i32, y: i32) -> InputResult<()> {
        let n = self.clicks.fetch_add(1, Ordering::Relaxed) + 1;
        log::info!("🖱️ [dry-run] click #{} at ({}, {})", n, x, y);
        Ok(())
    }
}
