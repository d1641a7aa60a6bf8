// Controller task - single owner of the state machine and the running detection loop
use super::broadcaster::{SubscriberId, Subscription};
use super::channels::create_controller_channels;
use super::click_gate::ClickGate;
use super::detection::{DetectionLoop, DetectorHandle};
use super::error::{ControllerError, ControllerResult};
use super::fsm::StateMachine;
use super::types::{
    ControllerCommand, ControllerSettings, ControllerSnapshot, Observation, QueueState,
};
use crate::input::InputExecutor;
use crate::probe::ScreenProbe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

pub struct Controller<P: ScreenProbe, E: InputExecutor> {
    fsm: StateMachine<E>,
    probe: Arc<P>,
    settings: ControllerSettings,
    detector: Option<DetectorHandle>,
    detector_epoch: u64,
    // Last state reported by the current loop; seeds its replacement
    last_observed: Option<QueueState>,
    command_rx: mpsc::Receiver<ControllerCommand>,
    observation_tx: mpsc::Sender<Observation>,
    observation_rx: mpsc::Receiver<Observation>,
    timer_rx: mpsc::Receiver<u64>,
}

/// Cheap, cloneable front door to a running controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    command_tx: mpsc::Sender<ControllerCommand>,
    snapshot_rx: watch::Receiver<ControllerSnapshot>,
}

impl<P: ScreenProbe, E: InputExecutor> Controller<P, E> {
    pub fn new(
        probe: Arc<P>,
        executor: Arc<E>,
        settings: ControllerSettings,
    ) -> (Self, ControllerHandle) {
        let (command_tx, command_rx, observation_tx, observation_rx, timer_tx, timer_rx) =
            create_controller_channels();

        let gate = ClickGate::new(
            executor,
            settings.click_policy,
            settings.accept_region,
            settings.queue_region,
        );
        let (fsm, snapshot_rx) = StateMachine::new(
            gate,
            settings.auto_accept_enabled,
            settings.stop_after_match_found_s,
            timer_tx,
        );

        let controller = Self {
            fsm,
            probe,
            settings,
            detector: None,
            detector_epoch: 0,
            last_observed: None,
            command_rx,
            observation_tx,
            observation_rx,
            timer_rx,
        };
        let handle = ControllerHandle {
            command_tx,
            snapshot_rx,
        };
        (controller, handle)
    }

    /// Build the controller and run it on its own task
    pub fn spawn(
        probe: Arc<P>,
        executor: Arc<E>,
        settings: ControllerSettings,
    ) -> (ControllerHandle, JoinHandle<()>) {
        let (controller, handle) = Self::new(probe, executor, settings);
        (handle, tokio::spawn(controller.run()))
    }

    fn start_detection(&mut self) {
        self.detector_epoch += 1;
        let (detector, handle) = DetectionLoop::new(
            Arc::clone(&self.probe),
            self.detector_epoch,
            self.settings.accept_region,
            self.settings.queue_region,
            self.settings.match_criteria,
            self.settings.poll_interval,
            self.observation_tx.clone(),
        );
        detector.seeded(self.last_observed).spawn();
        self.detector = Some(handle);
    }

    fn stop_detection(&mut self) {
        if let Some(detector) = self.detector.take() {
            detector.stop();
        }
    }

    fn reconfigure(&mut self, settings: ControllerSettings) {
        log::info!("🔧 Applying new controller settings");
        self.stop_detection();
        let gate = self.fsm.gate().reconfigured(
            settings.click_policy,
            settings.accept_region,
            settings.queue_region,
        );
        self.fsm.apply_settings(gate, settings.stop_after_match_found_s);
        self.settings = settings;
        self.start_detection();
    }

    /// Returns false once the controller should exit
    fn process_command(&mut self, command: ControllerCommand) -> bool {
        log::debug!("🤖 Processing controller command: {:?}", command);
        match command {
            ControllerCommand::StartQueue(reply) => {
                let _ = reply.send(self.fsm.start_queue());
            }
            ControllerCommand::StopQueue(reply) => {
                let _ = reply.send(self.fsm.stop_queue());
            }
            ControllerCommand::Reset(reply) => {
                let _ = reply.send(self.fsm.reset());
            }
            ControllerCommand::SetAutoAccept(enabled, reply) => {
                let _ = reply.send(self.fsm.set_auto_accept(enabled));
            }
            ControllerCommand::Subscribe(reply) => {
                let _ = reply.send(self.fsm.subscribe());
            }
            ControllerCommand::Unsubscribe(id) => {
                self.fsm.unsubscribe(id);
            }
            ControllerCommand::SubscriberCount(reply) => {
                let _ = reply.send(self.fsm.subscriber_count());
            }
            ControllerCommand::Reconfigure(settings) => self.reconfigure(*settings),
            ControllerCommand::Shutdown => return false,
        }
        true
    }

    pub async fn run(mut self) {
        log::info!("🎮 Queue controller started");
        self.start_detection();

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    // Every handle gone counts as shutdown
                    let Some(command) = command else { break };
                    if !self.process_command(command) {
                        break;
                    }
                }
                Some(observation) = self.observation_rx.recv() => {
                    if observation.epoch == self.detector_epoch {
                        self.last_observed = Some(observation.state);
                        self.fsm.on_observed(observation.state);
                    } else {
                        log::debug!("Dropping observation from stale detector #{}", observation.epoch);
                    }
                }
                Some(generation) = self.timer_rx.recv() => {
                    self.fsm.on_timeout(generation);
                }
            }
        }

        self.stop_detection();
        self.fsm.shutdown();
        log::info!("🛑 Queue controller shutting down");
    }
}

impl ControllerHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ControllerCommand,
    ) -> ControllerResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| ControllerError::ChannelClosed)
    }

    pub async fn start_queue(&self) -> ControllerResult<ControllerSnapshot> {
        self.request(ControllerCommand::StartQueue).await?
    }

    pub async fn stop_queue(&self) -> ControllerResult<ControllerSnapshot> {
        self.request(ControllerCommand::StopQueue).await?
    }

    pub async fn reset(&self) -> ControllerResult<ControllerSnapshot> {
        self.request(ControllerCommand::Reset).await
    }

    pub async fn set_auto_accept(&self, enabled: bool) -> ControllerResult<ControllerSnapshot> {
        self.request(|reply| ControllerCommand::SetAutoAccept(enabled, reply))
            .await
    }

    /// Latest published snapshot; never waits on the controller task
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub async fn subscribe(&self) -> ControllerResult<Subscription> {
        self.request(ControllerCommand::Subscribe).await
    }

    pub async fn unsubscribe(&self, id: SubscriberId) -> ControllerResult<()> {
        self.command_tx
            .send(ControllerCommand::Unsubscribe(id))
            .await
            .map_err(|_| ControllerError::ChannelClosed)
    }

    /// Live subscriber count, as seen by the controller task
    pub async fn subscriber_count(&self) -> ControllerResult<usize> {
        self.request(ControllerCommand::SubscriberCount).await
    }

    /// Swap detection and click settings in one step
    pub async fn reconfigure(&self, settings: ControllerSettings) -> ControllerResult<()> {
        self.command_tx
            .send(ControllerCommand::Reconfigure(Box::new(settings)))
            .await
            .map_err(|_| ControllerError::ChannelClosed)
    }

    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(ControllerCommand::Shutdown).await;
    }
}
