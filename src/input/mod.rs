// Input executor - performs the physical pointer click.
// The click gate decides when and where; executors only move and click.

pub mod dry_run;
#[cfg(feature = "desktop-input")]
pub mod enigo_impl;

pub use dry_run::DryRunExecutor;
#[cfg(feature = "desktop-input")]
pub use enigo_impl::EnigoExecutor;

use std::future::Future;
use thiserror::Error;

pub type InputResult<T> = Result<T, InputError>;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Click at ({x}, {y}) failed: {description}")]
    ClickFailed { x: i32, y: i32, description: String },
}

/// Fire-and-forget pointer click at absolute screen coordinates
pub trait InputExecutor: Send + Sync + 'static {
    fn click(&self, x: i32, y: i32) -> impl Future<Output = InputResult<()>> + Send;
}
