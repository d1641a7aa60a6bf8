// Detection loop - polls the screen probe and reports observed queue states on change
use super::types::{DetectionRegion, MatchCriteria, Observation, QueueState};
use crate::probe::ScreenProbe;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

/// Consecutive probe failures after which a streak is reported as an error
pub const PROBE_FAILURE_STREAK: u32 = 3;

pub struct DetectionLoop<P: ScreenProbe> {
    probe: Arc<P>,
    epoch: u64,
    accept_region: DetectionRegion,
    queue_region: DetectionRegion,
    criteria: MatchCriteria,
    poll_interval: Duration,
    observation_tx: mpsc::Sender<Observation>,
    stop_rx: watch::Receiver<bool>,
    last_observed: Option<QueueState>,
    consecutive_failures: u32,
}

/// Stop switch for a running detection loop. Cloning shares the switch.
#[derive(Debug, Clone)]
pub struct DetectorHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl DetectorHandle {
    /// Idempotent; the loop exits at its next iteration boundary
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

impl<P: ScreenProbe> DetectionLoop<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        probe: Arc<P>,
        epoch: u64,
        accept_region: DetectionRegion,
        queue_region: DetectionRegion,
        criteria: MatchCriteria,
        poll_interval: Duration,
        observation_tx: mpsc::Sender<Observation>,
    ) -> (Self, DetectorHandle) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let detector = Self {
            probe,
            epoch,
            accept_region,
            queue_region,
            criteria,
            poll_interval,
            observation_tx,
            stop_rx,
            last_observed: None,
            consecutive_failures: 0,
        };
        (detector, DetectorHandle { stop_tx: Arc::new(stop_tx) })
    }

    /// Start from a state a previous loop already reported, so a replacement
    /// loop does not re-announce what is still on screen
    pub fn seeded(mut self, last_observed: Option<QueueState>) -> Self {
        self.last_observed = last_observed;
        self
    }

    /// Spawn the loop on the runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Map a probe verdict onto the queue state it implies
    pub fn observed_state(&self, cue_present: bool) -> QueueState {
        if cue_present {
            QueueState::MatchFound
        } else if self.queue_region.is_configured() {
            QueueState::Searching
        } else {
            QueueState::Idle
        }
    }

    pub async fn run(mut self) {
        if !self.accept_region.is_configured() {
            log::info!("Accept region not configured; detection disabled");
            return;
        }
        log::debug!(
            "🔍 Detection loop #{} started (interval: {:?})",
            self.epoch,
            self.poll_interval
        );

        loop {
            let mut stop_rx = self.stop_rx.clone();
            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                handle_alive = async { stop_rx.wait_for(|stopped| *stopped).await.is_ok() } => {
                    // All handles dropped: nobody can stop us any more, so exit now
                    if !handle_alive {
                        break;
                    }
                }
            }
            if self.stop_requested() {
                break;
            }

            let verdict = self.probe.observe(self.accept_region, self.criteria).await;
            // A stop issued while the probe was in flight wins over its result
            if self.stop_requested() {
                break;
            }

            let cue_present = match verdict {
                Ok(present) => {
                    if self.consecutive_failures > 0 {
                        log::info!(
                            "Probe recovered after {} failed polls",
                            self.consecutive_failures
                        );
                    }
                    self.consecutive_failures = 0;
                    present
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    if self.consecutive_failures == PROBE_FAILURE_STREAK {
                        log::error!(
                            "❌ Probe failed {} times in a row, treating polls as no observation: {}",
                            self.consecutive_failures,
                            e
                        );
                    } else if self.consecutive_failures < PROBE_FAILURE_STREAK {
                        log::warn!("⚠️ Probe failed: {}", e);
                    } else {
                        log::debug!("Probe still failing: {}", e);
                    }
                    continue;
                }
            };

            let state = self.observed_state(cue_present);
            if self.last_observed == Some(state) {
                continue;
            }
            log::debug!("🔍 Observed {:?} -> {}", self.last_observed, state);
            self.last_observed = Some(state);

            let observation = Observation {
                epoch: self.epoch,
                state,
            };
            if self.observation_tx.send(observation).await.is_err() {
                log::debug!("Observation channel closed; detection loop exiting");
                break;
            }
        }

        log::debug!("🔍 Detection loop #{} ended", self.epoch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::tests::ScriptedProbe;

    fn configured() -> DetectionRegion {
        DetectionRegion::new(10, 10, 20, 20)
    }

    fn detector(
        probe: Arc<ScriptedProbe>,
        accept: DetectionRegion,
        queue: DetectionRegion,
    ) -> (
        DetectionLoop<ScriptedProbe>,
        DetectorHandle,
        mpsc::Receiver<Observation>,
    ) {
        let (tx, rx) = mpsc::channel(32);
        let (detector, handle) = DetectionLoop::new(
            probe,
            7,
            accept,
            queue,
            MatchCriteria::default(),
            Duration::from_millis(100),
            tx,
        );
        (detector, handle, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<Observation>) -> Vec<QueueState> {
        let mut out = Vec::new();
        while let Ok(obs) = rx.try_recv() {
            out.push(obs.state);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_found_fires_once_on_transition_poll() {
        let probe = Arc::new(ScriptedProbe::new(vec![
            Ok(false),
            Ok(false),
            Ok(true),
            Ok(true),
            Ok(true),
        ]));
        let (detector, handle, mut rx) = detector(probe.clone(), configured(), configured());
        let task = detector.spawn();

        // Two quiet polls
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(drain(&mut rx), vec![QueueState::Searching]);

        // Third poll sees the cue, fourth and fifth repeat it
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(drain(&mut rx), vec![QueueState::MatchFound]);

        handle.stop();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_loop_only_reports_changes() {
        let probe = Arc::new(ScriptedProbe::new(vec![Ok(true), Ok(true), Ok(false)]));
        let (detector, handle, mut rx) = detector(probe.clone(), configured(), configured());
        let task = detector.seeded(Some(QueueState::MatchFound)).spawn();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(drain(&mut rx).is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(drain(&mut rx), vec![QueueState::Searching]);

        handle.stop();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_verdicts_fire_at_most_once() {
        let probe = Arc::new(ScriptedProbe::repeating(true));
        let (detector, handle, mut rx) = detector(probe.clone(), configured(), configured());
        let task = detector.spawn();

        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.stop();
        task.await.unwrap();

        assert!(probe.calls() >= 40);
        assert_eq!(drain(&mut rx), vec![QueueState::MatchFound]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_queue_region_absence_maps_to_idle() {
        let probe = Arc::new(ScriptedProbe::new(vec![Ok(false), Ok(true), Ok(false)]));
        let (detector, handle, mut rx) =
            detector(probe, configured(), DetectionRegion::default());
        let task = detector.spawn();

        tokio::time::sleep(Duration::from_millis(350)).await;
        handle.stop();
        task.await.unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![QueueState::Idle, QueueState::MatchFound, QueueState::Idle]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfigured_accept_region_exits_immediately() {
        let probe = Arc::new(ScriptedProbe::repeating(true));
        let (detector, _handle, mut rx) =
            detector(probe.clone(), DetectionRegion::default(), configured());

        detector.run().await;

        assert_eq!(probe.calls(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_probes() {
        let probe = Arc::new(ScriptedProbe::repeating(false));
        let (detector, handle, _rx) = detector(probe.clone(), configured(), configured());
        let task = detector.spawn();

        tokio::time::sleep(Duration::from_millis(350)).await;
        handle.stop();
        handle.stop();
        task.await.unwrap();
        let calls = probe.calls();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(probe.calls(), calls);
        assert!(handle.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_in_flight_probe_suppresses_emit() {
        let probe = Arc::new(
            ScriptedProbe::repeating(true).with_latency(Duration::from_millis(500)),
        );
        let (detector, handle, mut rx) = detector(probe.clone(), configured(), configured());
        let task = detector.spawn();

        // First poll starts at 100ms and is still in flight at 300ms
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.stop();
        task.await.unwrap();

        assert_eq!(probe.calls(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failures_do_not_change_state() {
        let unavailable = || -> crate::probe::ProbeResult<bool> {
            Err(crate::probe::ProbeError::Unavailable {
                description: "capture busy".to_string(),
            })
        };
        let probe = Arc::new(ScriptedProbe::new(vec![
            Ok(false),
            unavailable(),
            unavailable(),
            unavailable(),
            unavailable(),
            Ok(false),
            Ok(true),
        ]));
        let (detector, handle, mut rx) = detector(probe, configured(), configured());
        let task = detector.spawn();

        tokio::time::sleep(Duration::from_millis(750)).await;
        handle.stop();
        task.await.unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![QueueState::Searching, QueueState::MatchFound]
        );
    }
}
