// Click gate - turns "click now" intents into delayed, jittered, throttled clicks
use super::types::{ClickPolicy, ClickTarget, DetectionRegion};
use crate::input::InputExecutor;
use rand::Rng;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep};

/// What happened to a single click request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Executed { x: i32, y: i32 },
    SuppressedByCooldown,
    Failed,
}

pub struct ClickGate<E: InputExecutor> {
    executor: Arc<E>,
    policy: ClickPolicy,
    accept_region: DetectionRegion,
    queue_region: DetectionRegion,
    // Instant of the last executed click, shared by all in-flight requests
    last_click: Arc<Mutex<Option<Instant>>>,
}

impl<E: InputExecutor> ClickGate<E> {
    pub fn new(
        executor: Arc<E>,
        policy: ClickPolicy,
        accept_region: DetectionRegion,
        queue_region: DetectionRegion,
    ) -> Self {
        Self {
            executor,
            policy,
            accept_region,
            queue_region,
            last_click: Arc::new(Mutex::new(None)),
        }
    }

    /// Build a gate for new settings that keeps this gate's cooldown history,
    /// so swapping configuration cannot be used to click twice inside a cooldown.
    pub fn reconfigured(
        &self,
        policy: ClickPolicy,
        accept_region: DetectionRegion,
        queue_region: DetectionRegion,
    ) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            policy,
            accept_region,
            queue_region,
            last_click: Arc::clone(&self.last_click),
        }
    }

    pub fn region_for(&self, target: ClickTarget) -> DetectionRegion {
        match target {
            ClickTarget::Accept => self.accept_region,
            ClickTarget::Queue => self.queue_region,
        }
    }

    /// Queue a click on `target`.
    ///
    /// Returns `None` when the target region is not configured (the request is
    /// dropped). Otherwise the delay, jitter and cooldown check run in a spawned
    /// task so the caller never waits on the simulated reaction time.
    pub fn request_click(&self, target: ClickTarget) -> Option<JoinHandle<ClickOutcome>> {
        let region = self.region_for(target);
        if !region.is_configured() {
            log::debug!("{} region not configured; skipping click", target.label());
            return None;
        }

        log::info!("Clicking {}", target.label());
        let executor = Arc::clone(&self.executor);
        let last_click = Arc::clone(&self.last_click);
        let policy = self.policy;

        Some(tokio::spawn(async move {
            sleep(sample_delay(&policy)).await;
            let (x, y) = jittered_point(region, policy.jitter_px);

            {
                let mut last = last_click.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(prev) = *last
                    && prev.elapsed() < policy.cooldown
                {
                    log::info!(
                        "Click suppressed by cooldown ({:?} remaining)",
                        policy.cooldown.saturating_sub(prev.elapsed())
                    );
                    return ClickOutcome::SuppressedByCooldown;
                }
                *last = Some(Instant::now());
            }

            match executor.click(x, y).await {
                Ok(()) => ClickOutcome::Executed { x, y },
                Err(e) => {
                    log::error!("❌ {}", e);
                    ClickOutcome::Failed
                }
            }
        }))
    }
}

/// Uniform reaction delay in `[delay_min, delay_max]`
pub fn sample_delay(policy: &ClickPolicy) -> Duration {
    if policy.delay_max <= policy.delay_min {
        return policy.delay_min;
    }
    let secs = rand::thread_rng()
        .gen_range(policy.delay_min.as_secs_f64()..=policy.delay_max.as_secs_f64());
    Duration::from_secs_f64(secs)
}

/// Region center displaced by up to `jitter_px` on each axis independently
pub fn jittered_point(region: DetectionRegion, jitter_px: i32) -> (i32, i32) {
    let (cx, cy) = region.center();
    if jitter_px <= 0 {
        return (cx, cy);
    }
    let mut rng = rand::thread_rng();
    (
        cx.saturating_add(rng.gen_range(-jitter_px..=jitter_px)),
        cy.saturating_add(rng.gen_range(-jitter_px..=jitter_px)),
    )
}
