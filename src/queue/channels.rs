// Communication channels between the controller task and its producers
use super::types::{ControllerCommand, Observation};
use tokio::sync::mpsc;

pub const COMMAND_CAPACITY: usize = 32;
pub const OBSERVATION_CAPACITY: usize = 32;

/// Helper function to create the controller's inbound channels:
/// commands from the control surface, observations from detection loops,
/// and disarm-timer firings (carrying the timer generation).
pub fn create_controller_channels() -> (
    mpsc::Sender<ControllerCommand>,
    mpsc::Receiver<ControllerCommand>,
    mpsc::Sender<Observation>,
    mpsc::Receiver<Observation>,
    mpsc::Sender<u64>,
    mpsc::Receiver<u64>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (obs_tx, obs_rx) = mpsc::channel(OBSERVATION_CAPACITY);
    let (timer_tx, timer_rx) = mpsc::channel(4);
    (cmd_tx, cmd_rx, obs_tx, obs_rx, timer_tx, timer_rx)
}
