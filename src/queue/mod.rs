// Queue lifecycle controller
// Watches for the match-found cue, drives the queue state machine and
// decides when automated clicks happen.

pub mod broadcaster;
pub mod channels;
pub mod click_gate;
pub mod controller;
pub mod detection;
pub mod error;
pub mod fsm;
pub mod types;


// Re-export the main types and functions for easy access
pub use broadcaster::{Broadcaster, SubscriberId, Subscription};
pub use channels::create_controller_channels;
pub use click_gate::{ClickGate, ClickOutcome};
pub use controller::{Controller, ControllerHandle};
pub use detection::{DetectionLoop, DetectorHandle};
pub use error::{ControllerError, ControllerResult};
pub use fsm::StateMachine;
pub use types::{
    ClickPolicy, ClickTarget, ControllerCommand, ControllerSettings, ControllerSnapshot,
    DetectionRegion, MatchCriteria, Observation, QueueState,
};
