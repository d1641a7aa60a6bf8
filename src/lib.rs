pub mod app;
pub mod args;
pub mod config;
pub mod input;
pub mod logging;
pub mod probe;
pub mod queue;
pub mod server;

pub use config::AppConfig;
pub use queue::{Controller, ControllerHandle, ControllerSnapshot, QueueState};
