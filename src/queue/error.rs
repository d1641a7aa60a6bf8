use super::types::QueueState;
use thiserror::Error;

pub type ControllerResult<T> = Result<T, ControllerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("Cannot {command} while the queue is {state}")]
    InvalidTransition {
        command: &'static str,
        state: QueueState,
    },

    #[error("Controller command channel closed")]
    ChannelClosed,
}
