//! The dispatcher: uploads matrices, polls the device, logs events,
//! and sequences trials.
//!
//! The public [`Dispatcher`] is a handle; the work happens in a
//! spawned task that exclusively owns the device channel, the active
//! table, and the event log. Commands cross over an mpsc channel with
//! oneshot reply ports, so callers never share mutable state with the
//! poll loop — a new matrix is handed off through a single-slot
//! pending mailbox inside the task, and everything read back out is a
//! snapshot.

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};

use super::error::DispatchError;
use super::notification::{Notification, Notifications};
use super::phase::DispatchPhase;
use super::status::{DispatchStatus, SessionInfo};
use crate::config::RigConfig;
use crate::device::{self, DeviceChannel};
use crate::events::{EventLog, EventRecord};
use crate::matrix::{CompiledMatrix, StateMatrix};
use std::sync::Arc;

enum Command {
    SetMatrix {
        matrix: StateMatrix,
        reply: oneshot::Sender<Result<(), DispatchError>>,
    },
    ReadyToStartTrial {
        reply: oneshot::Sender<Result<(), DispatchError>>,
    },
    Phase {
        reply: oneshot::Sender<DispatchPhase>,
    },
    Status {
        reply: oneshot::Sender<DispatchStatus>,
    },
    Events {
        reply: oneshot::Sender<Vec<EventRecord>>,
    },
    Die {
        reply: oneshot::Sender<EventLog>,
    },
}

/// Handle to a running dispatcher task.
///
/// Construction spawns the poll loop onto the ambient Tokio runtime;
/// every method is a message round-trip to it. Dropping the handle
/// (all clones of it, if the caller wrapped it in an `Arc`) tears the
/// task down the same way [`die`] does.
///
/// [`die`]: Dispatcher::die
pub struct Dispatcher {
    commands: mpsc::UnboundedSender<Command>,
}

impl Dispatcher {
    /// Connect the device the configuration selects and spawn the
    /// poll loop. Must be called within a Tokio runtime.
    pub fn new(config: RigConfig) -> Result<(Self, Notifications), DispatchError> {
        config.validate()?;
        let device = device::connect(&config);
        Ok(Self::spawn(config, device))
    }

    /// Spawn the poll loop over a caller-supplied channel — the seam
    /// for custom transports and for tests.
    pub fn with_device(
        config: RigConfig,
        device: Box<dyn DeviceChannel>,
    ) -> Result<(Self, Notifications), DispatchError> {
        config.validate()?;
        Ok(Self::spawn(config, device))
    }

    fn spawn(config: RigConfig, device: Box<dyn DeviceChannel>) -> (Self, Notifications) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (notify, notify_rx) = mpsc::unbounded_channel();
        let session = SessionInfo::generate();
        let span = info_span!("dispatcher", session = %session.session_id);

        let poll_loop = PollLoop {
            device,
            interval: config.poll_interval,
            phase: DispatchPhase::Idle,
            active: None,
            pending: None,
            current_state: 0,
            trial: 0,
            trial_start: 0,
            log: EventLog::new(),
            mirror: Vec::new(),
            notify,
            started: Instant::now(),
            session,
        };
        tokio::spawn(poll_loop.run(command_rx).instrument(span));

        (Self { commands }, Notifications::new(notify_rx))
    }

    /// Queue `matrix` for the next trial.
    ///
    /// The matrix is compiled here (definition problems surface to the
    /// caller that built it) and placed in the single-slot pending
    /// mailbox, replacing whatever was queued before. The running
    /// trial, if any, is never interrupted: the new table is uploaded
    /// at the next acknowledged trial boundary.
    pub async fn set_state_matrix(&self, matrix: StateMatrix) -> Result<(), DispatchError> {
        self.request(|reply| Command::SetMatrix { matrix, reply })
            .await?
    }

    /// Acknowledge that trial preparation is complete: upload the
    /// pending table (or re-arm the active one) and start polling.
    ///
    /// Legal in `Armed` (the initial start) and `AwaitingNextTrial`;
    /// anywhere else this fails with
    /// [`DispatchError::ProtocolSequence`] and changes nothing.
    pub async fn ready_to_start_trial(&self) -> Result<(), DispatchError> {
        self.request(|reply| Command::ReadyToStartTrial { reply })
            .await?
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> Result<DispatchPhase, DispatchError> {
        self.request(|reply| Command::Phase { reply }).await
    }

    /// Snapshot of session identity, phase, trial index, log length,
    /// and asserted outputs.
    pub async fn status(&self) -> Result<DispatchStatus, DispatchError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Snapshot of the full event log.
    pub async fn events(&self) -> Result<Vec<EventRecord>, DispatchError> {
        self.request(|reply| Command::Events { reply }).await
    }

    /// Tear down: stop polling, release the device (close failures are
    /// swallowed), and end the task, handing back the final event log
    /// for reading. Idempotent — later calls return `None` — and no
    /// notification fires after it returns. Takes effect at the loop's
    /// next wait boundary, never mid-cycle.
    pub async fn die(&self) -> Option<EventLog> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Die { reply }).is_err() {
            return None; // already gone
        }
        rx.await.ok()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, DispatchError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| DispatchError::Terminated)?;
        rx.await.map_err(|_| DispatchError::Terminated)
    }
}

/// The task side: exclusive owner of device, table, and log.
struct PollLoop {
    device: Box<dyn DeviceChannel>,
    interval: Duration,
    phase: DispatchPhase,
    active: Option<Arc<CompiledMatrix>>,
    pending: Option<Arc<CompiledMatrix>>,
    current_state: usize,
    trial: usize,
    trial_start: usize,
    log: EventLog,
    mirror: Vec<bool>,
    notify: mpsc::UnboundedSender<Notification>,
    started: Instant,
    session: SessionInfo,
}

impl PollLoop {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut ticker = time::interval(self.interval);
        // Tick deadlines stay aligned to loop start; an over-running
        // cycle skips ticks instead of overlapping or bunching.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await.is_break() {
                            break;
                        }
                    }
                    // Every handle is gone; tear down as die() would.
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },

                _ = ticker.tick(), if self.phase == DispatchPhase::Running => {
                    self.poll_cycle().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::SetMatrix { matrix, reply } => {
                let _ = reply.send(self.set_matrix(matrix));
            }
            Command::ReadyToStartTrial { reply } => {
                let _ = reply.send(self.start_trial().await);
            }
            Command::Phase { reply } => {
                let _ = reply.send(self.phase);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Events { reply } => {
                let _ = reply.send(self.log.records().to_vec());
            }
            Command::Die { reply } => {
                self.shutdown().await;
                let _ = reply.send(self.log.clone());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn set_matrix(&mut self, matrix: StateMatrix) -> Result<(), DispatchError> {
        let table = Arc::new(matrix.compile()?);
        debug!(
            states = table.num_states(),
            ready = table.ready_index(),
            "state matrix queued"
        );
        self.pending = Some(table);
        if self.phase == DispatchPhase::Idle {
            self.phase = DispatchPhase::Armed;
        }
        Ok(())
    }

    async fn start_trial(&mut self) -> Result<(), DispatchError> {
        match self.phase {
            DispatchPhase::Armed | DispatchPhase::AwaitingNextTrial => {}
            phase => return Err(DispatchError::ProtocolSequence { phase }),
        }
        let Some(table) = self.pending.take().or_else(|| self.active.clone()) else {
            return Err(DispatchError::ProtocolSequence { phase: self.phase });
        };

        let payload = match table.encode() {
            Ok(payload) => payload,
            Err(e) => {
                self.pending = Some(table);
                return Err(crate::device::DeviceError::BadTable(e.to_string()).into());
            }
        };
        if let Err(e) = self.device.upload(&payload).await {
            self.pending = Some(table);
            return Err(e.into());
        }
        if let Err(e) = self.device.start().await {
            self.pending = Some(table);
            return Err(e.into());
        }

        self.mirror = vec![false; table.outputs().len()];
        self.apply_entry(&table, 0);
        self.current_state = 0;
        self.trial_start = self.log.len();
        self.active = Some(table);
        self.phase = DispatchPhase::Running;
        info!(trial = self.trial, "trial started");
        Ok(())
    }

    /// One fixed-interval cycle: drain the device, decode transitions,
    /// log, detect trial completion, notify.
    async fn poll_cycle(&mut self) {
        let Some(table) = self.active.clone() else {
            return;
        };
        let batch = match self.device.poll().await {
            Ok(batch) => batch,
            Err(e) => {
                // Unconfirmed read: keep the current state and let the
                // device re-report at the next tick. No tic fires for
                // a cycle that observed nothing.
                warn!(error = %e, "poll failed; retrying next tick");
                return;
            }
        };

        let mut recent = Vec::with_capacity(batch.len());
        for event in batch {
            let next = match table.column_of(&event.label) {
                Some(column) => table.next(self.current_state, column),
                None => {
                    warn!(label = %event.label, "event outside the matrix vocabulary");
                    self.current_state
                }
            };
            if next != self.current_state {
                self.apply_entry(&table, next);
            }
            let record = EventRecord {
                timestamp: event.timestamp,
                label: event.label,
                state: next,
            };
            self.log.append(record.clone());
            recent.push(record);
            self.current_state = next;
        }

        if self.current_state == table.ready_index() {
            self.trial += 1;
            let trial_events = self.log.since(self.trial_start).to_vec();
            info!(
                next_trial = self.trial,
                events = trial_events.len(),
                "ready state reached"
            );
            let _ = self.notify.send(Notification::PrepareNextTrial {
                next_trial: self.trial,
                trial_events,
            });
            self.phase = DispatchPhase::AwaitingNextTrial;
        }

        let _ = self.notify.send(Notification::TimerTic {
            elapsed: self.started.elapsed().as_secs_f64(),
            recent,
        });
    }

    /// Mirror a state's entry actions, deasserts strictly first.
    fn apply_entry(&mut self, table: &CompiledMatrix, state: usize) {
        if let Some(state) = table.state(state) {
            for (bit, level) in state.entry_actions(self.mirror.len()) {
                self.mirror[bit] = level;
            }
        }
    }

    fn status(&self) -> DispatchStatus {
        let outputs_on = match &self.active {
            Some(table) => table
                .outputs()
                .iter()
                .zip(&self.mirror)
                .filter(|(_, on)| **on)
                .map(|(label, _)| label.clone())
                .collect(),
            None => Vec::new(),
        };
        DispatchStatus {
            session: self.session.clone(),
            phase: self.phase,
            trial: self.trial,
            events_logged: self.log.len(),
            outputs_on,
        }
    }

    async fn shutdown(&mut self) {
        if self.phase == DispatchPhase::Terminated {
            return;
        }
        // die() is best effort: a dead link must not block teardown.
        if let Err(e) = self.device.close().await {
            debug!(error = %e, "device close failed during teardown (ignored)");
        }
        self.phase = DispatchPhase::Terminated;
        info!("dispatcher terminated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RigConfig, ServerType};
    use crate::matrix::StateSpec;

    fn config(server_type: ServerType) -> RigConfig {
        RigConfig {
            inputs: vec!["Cin".into()],
            outputs: vec!["CenterWater".into()],
            server_type,
            poll_interval: Duration::from_millis(5),
        }
    }

    fn one_state_matrix() -> StateMatrix {
        let mut sm = StateMatrix::new(["Cin"], ["CenterWater"], "ready").unwrap();
        sm.add_state(StateSpec::new("wait").on("Cin", "ready"))
            .unwrap();
        sm
    }

    #[tokio::test]
    async fn starts_idle() {
        let (dispatcher, _notifications) = Dispatcher::new(config(ServerType::Dummy)).unwrap();
        let phase = dispatcher.phase().await.unwrap();
        assert_eq!(phase, DispatchPhase::Idle);
        assert!(phase.is_live());
        dispatcher.die().await;
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let mut bad = config(ServerType::Dummy);
        bad.poll_interval = Duration::ZERO;
        assert!(matches!(
            Dispatcher::new(bad),
            Err(DispatchError::Config(_))
        ));
    }

    #[tokio::test]
    async fn setting_a_matrix_arms_the_dispatcher() {
        let (dispatcher, _notifications) = Dispatcher::new(config(ServerType::Dummy)).unwrap();
        dispatcher.set_state_matrix(one_state_matrix()).await.unwrap();
        assert_eq!(dispatcher.phase().await.unwrap(), DispatchPhase::Armed);
        dispatcher.die().await;
    }

    #[tokio::test]
    async fn unresolved_matrix_surfaces_to_the_caller() {
        let (dispatcher, _notifications) = Dispatcher::new(config(ServerType::Dummy)).unwrap();
        let mut sm = StateMatrix::new(["Cin"], ["CenterWater"], "ready").unwrap();
        sm.add_state(StateSpec::new("wait").on("Cin", "nowhere"))
            .unwrap();

        let result = dispatcher.set_state_matrix(sm).await;
        assert!(matches!(result, Err(DispatchError::Matrix(_))));
        assert_eq!(dispatcher.phase().await.unwrap(), DispatchPhase::Idle);
        dispatcher.die().await;
    }

    #[tokio::test]
    async fn acknowledging_with_nothing_pending_is_a_protocol_error() {
        let (dispatcher, _notifications) = Dispatcher::new(config(ServerType::Dummy)).unwrap();
        let result = dispatcher.ready_to_start_trial().await;
        assert!(matches!(
            result,
            Err(DispatchError::ProtocolSequence {
                phase: DispatchPhase::Idle
            })
        ));
        dispatcher.die().await;
    }

    #[tokio::test]
    async fn armed_acknowledgment_starts_the_first_trial() {
        let (dispatcher, _notifications) = Dispatcher::new(config(ServerType::Dummy)).unwrap();
        dispatcher.set_state_matrix(one_state_matrix()).await.unwrap();
        dispatcher.ready_to_start_trial().await.unwrap();
        assert_eq!(dispatcher.phase().await.unwrap(), DispatchPhase::Running);

        // A second acknowledgment mid-trial is out of turn.
        assert!(matches!(
            dispatcher.ready_to_start_trial().await,
            Err(DispatchError::ProtocolSequence {
                phase: DispatchPhase::Running
            })
        ));
        dispatcher.die().await;
    }

    #[tokio::test]
    async fn die_is_idempotent_and_kills_the_handle() {
        let (dispatcher, mut notifications) = Dispatcher::new(config(ServerType::Dummy)).unwrap();
        let final_log = dispatcher.die().await;
        assert!(final_log.is_some_and(|log| log.is_empty()));
        assert!(dispatcher.die().await.is_none());

        assert!(matches!(
            dispatcher.phase().await,
            Err(DispatchError::Terminated)
        ));
        // The notification stream ends with the task.
        assert!(notifications.recv().await.is_none());
    }

    #[tokio::test]
    async fn status_reports_session_and_log_length() {
        let (dispatcher, _notifications) = Dispatcher::new(config(ServerType::Dummy)).unwrap();
        let status = dispatcher.status().await.unwrap();
        assert_eq!(status.phase, DispatchPhase::Idle);
        assert_eq!(status.trial, 0);
        assert_eq!(status.events_logged, 0);
        assert!(status.outputs_on.is_empty());
        dispatcher.die().await;
    }
}
