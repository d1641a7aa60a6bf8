use thiserror::Error;

/// A specialized `Result` type for screen probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to load frame: {source}")]
    FrameLoadFailed {
        #[from]
        source: image::ImageError,
    },

    #[error("Frame capture task failed: {source}")]
    JoinError {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error(
        "Region [{x},{y},{width},{height}] lies outside the {frame_width}x{frame_height} frame"
    )]
    RegionOutsideFrame {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("Probe unavailable: {description}")]
    Unavailable { description: String },
}
