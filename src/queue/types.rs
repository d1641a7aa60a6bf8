// Types and enums for the queue lifecycle controller
use super::broadcaster::{SubscriberId, Subscription};
use super::error::ControllerResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Idle,
    Searching,
    MatchFound,
    Accepted,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Idle => "idle",
            QueueState::Searching => "searching",
            QueueState::MatchFound => "match_found",
            QueueState::Accepted => "accepted",
        }
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the controller, handed out by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub queue_state: QueueState,
    pub auto_accept_enabled: bool,
    pub last_event: Option<String>,
    pub last_state_change_at: Option<DateTime<Utc>>,
    pub last_match_found_at: Option<DateTime<Utc>>,
}

impl ControllerSnapshot {
    pub fn initial(auto_accept_enabled: bool) -> Self {
        Self {
            queue_state: QueueState::Idle,
            auto_accept_enabled,
            last_event: None,
            last_state_change_at: None,
            last_match_found_at: None,
        }
    }
}

/// Rectangular screen region in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl DetectionRegion {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A region with zero or negative size disables whatever uses it
    pub fn is_configured(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }

    /// True when the far edges `x + width` and `y + height` fit in `i32`
    pub fn fits_screen_space(&self) -> bool {
        self.x.checked_add(self.width).is_some() && self.y.checked_add(self.height).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickPolicy {
    pub delay_min: Duration,
    pub delay_max: Duration,
    pub jitter_px: i32,
    pub cooldown: Duration,
}

impl Default for ClickPolicy {
    fn default() -> Self {
        Self {
            delay_min: Duration::from_millis(200),
            delay_max: Duration::from_millis(500),
            jitter_px: 4,
            cooldown: Duration::from_secs(1),
        }
    }
}

/// Logical click destination; the click gate maps it onto a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    Accept,
    Queue,
}

impl ClickTarget {
    pub fn label(&self) -> &'static str {
        match self {
            ClickTarget::Accept => "Accept button",
            ClickTarget::Queue => "Find Match / Cancel button",
        }
    }
}

/// Colour criteria the screen probe evaluates inside a region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchCriteria {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Max per-channel distance for a pixel to count as matching
    pub tolerance: u8,
    /// Fraction of region pixels (0.0-1.0] that must match
    pub min_fraction: f32,
}

impl Default for MatchCriteria {
    fn default() -> Self {
        Self {
            r: 0,
            g: 200,
            b: 0,
            tolerance: 40,
            min_fraction: 0.5,
        }
    }
}

/// Everything the controller reads from configuration at construction or reconfigure.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub accept_region: DetectionRegion,
    pub queue_region: DetectionRegion,
    pub match_criteria: MatchCriteria,
    pub poll_interval: Duration,
    pub click_policy: ClickPolicy,
    /// Seconds before an unanswered match disarms auto-accept; <= 0 disables
    pub stop_after_match_found_s: f64,
    pub auto_accept_enabled: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            accept_region: DetectionRegion::default(),
            queue_region: DetectionRegion::default(),
            match_criteria: MatchCriteria::default(),
            poll_interval: Duration::from_millis(750),
            click_policy: ClickPolicy::default(),
            stop_after_match_found_s: 15.0,
            auto_accept_enabled: true,
        }
    }
}

/// Observation emitted by a detection loop, tagged with the loop's epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub epoch: u64,
    pub state: QueueState,
}

/// Requests handled by the controller task. Replies travel back on the oneshot.
#[derive(Debug)]
pub enum ControllerCommand {
    StartQueue(oneshot::Sender<ControllerResult<ControllerSnapshot>>),
    StopQueue(oneshot::Sender<ControllerResult<ControllerSnapshot>>),
    Reset(oneshot::Sender<ControllerSnapshot>),
    SetAutoAccept(bool, oneshot::Sender<ControllerSnapshot>),
    Subscribe(oneshot::Sender<Subscription>),
    Unsubscribe(SubscriberId),
    SubscriberCount(oneshot::Sender<usize>),
    Reconfigure(Box<ControllerSettings>),
    Shutdown,
}
