//! In-process simulated controller.
//!
//! Executes the uploaded compiled table the way the hardware would:
//! runs state timers, fires `Tup` expiries, applies output entry
//! actions to a set of virtual lines, and accepts input events injected
//! through a [`SimulatedDeviceHandle`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{DeviceChannel, DeviceError, DeviceEvent};
use crate::config::ServerType;
use crate::matrix::{CompiledMatrix, TIMER_EVENT};

/// Simulated state machine controller.
///
/// The device clock starts at the first `start()` and is never reset
/// afterwards, so event timestamps stay monotonic across trials.
/// Later `start()` calls only jump execution back to state zero.
pub struct SimulatedDevice {
    table: Option<Arc<CompiledMatrix>>,
    state: usize,
    running: bool,
    epoch: Option<Instant>,
    state_entered: f64,
    lines: Vec<bool>,
    inject_tx: mpsc::UnboundedSender<String>,
    inject_rx: mpsc::UnboundedReceiver<String>,
}

/// Cloneable handle for injecting input events into a simulator.
///
/// Injected events are timestamped at the poll that drains them.
#[derive(Clone, Debug)]
pub struct SimulatedDeviceHandle {
    tx: mpsc::UnboundedSender<String>,
}

impl SimulatedDeviceHandle {
    /// Queue an input event by label.
    pub fn input(&self, label: impl Into<String>) {
        let _ = self.tx.send(label.into());
    }
}

impl SimulatedDevice {
    pub fn new() -> Self {
        let (inject_tx, inject_rx) = mpsc::unbounded_channel();
        Self {
            table: None,
            state: 0,
            running: false,
            epoch: None,
            state_entered: 0.0,
            lines: Vec::new(),
            inject_tx,
            inject_rx,
        }
    }

    /// Handle for injecting inputs. Grab one before boxing the device.
    pub fn handle(&self) -> SimulatedDeviceHandle {
        SimulatedDeviceHandle {
            tx: self.inject_tx.clone(),
        }
    }

    /// Index of the state currently executing.
    pub fn state_index(&self) -> usize {
        self.state
    }

    /// Levels of the virtual output lines, in bitmask order.
    pub fn output_lines(&self) -> &[bool] {
        &self.lines
    }

    fn now(&self) -> f64 {
        self.epoch.map_or(0.0, |e| e.elapsed().as_secs_f64())
    }

    /// Enter a state at device time `at`: apply its output actions
    /// (deasserts first) and restart its timer.
    fn enter(&mut self, table: &CompiledMatrix, next: usize, at: f64) {
        if let Some(state) = table.state(next) {
            for (bit, level) in state.entry_actions(self.lines.len()) {
                self.lines[bit] = level;
            }
        }
        self.state = next;
        self.state_entered = at;
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceChannel for SimulatedDevice {
    async fn upload(&mut self, table: &[u8]) -> Result<(), DeviceError> {
        let decoded =
            CompiledMatrix::decode(table).map_err(|e| DeviceError::BadTable(e.to_string()))?;
        debug!(
            states = decoded.num_states(),
            outputs = decoded.outputs().len(),
            "table uploaded to simulator"
        );
        self.lines = vec![false; decoded.outputs().len()];
        self.state = 0;
        self.running = false;
        self.table = Some(Arc::new(decoded));
        Ok(())
    }

    async fn start(&mut self) -> Result<(), DeviceError> {
        let table = Arc::clone(self.table.as_ref().ok_or(DeviceError::NoTable)?);
        if self.epoch.is_none() {
            self.epoch = Some(Instant::now());
        }
        let now = self.now();
        self.enter(&table, 0, now);
        self.running = true;
        Ok(())
    }

    async fn poll(&mut self) -> Result<Vec<DeviceEvent>, DeviceError> {
        if !self.running {
            return Ok(Vec::new());
        }
        let table = Arc::clone(self.table.as_ref().ok_or(DeviceError::NoTable)?);
        let Some(tup) = table.column_of(TIMER_EVENT) else {
            return Err(DeviceError::BadTable("missing timer column".to_string()));
        };
        let now = self.now();
        let mut events = Vec::new();

        // Timer expiries since the last poll, chained: each one is
        // stamped at its true deadline, and entering the next state
        // (a self-jump included) restarts that state's timer.
        loop {
            let Some(state) = table.state(self.state) else {
                break;
            };
            let timer = state.timer();
            if timer <= 0.0 {
                break;
            }
            let deadline = self.state_entered + timer;
            if deadline > now {
                break;
            }
            let next = table.next(self.state, tup);
            events.push(DeviceEvent {
                timestamp: deadline,
                label: TIMER_EVENT.to_string(),
            });
            self.enter(&table, next, deadline);
        }

        // Injected inputs drain at this poll's clock. Inputs the
        // current state does not route are reported but leave the
        // state (and its running timer) alone.
        while let Ok(label) = self.inject_rx.try_recv() {
            match table.column_of(&label) {
                Some(column) => {
                    let next = table.next(self.state, column);
                    events.push(DeviceEvent {
                        timestamp: now,
                        label,
                    });
                    if next != self.state {
                        self.enter(&table, next, now);
                    }
                }
                None => warn!(%label, "injected input outside the table vocabulary; dropped"),
            }
        }

        Ok(events)
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        self.running = false;
        Ok(())
    }

    fn server_type(&self) -> ServerType {
        ServerType::Simulator
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::matrix::{StateMatrix, StateSpec};

    fn upload_payload(sm: &StateMatrix) -> Vec<u8> {
        sm.compile().unwrap().encode().unwrap()
    }

    fn timed_chain() -> StateMatrix {
        let mut sm = StateMatrix::new(["Cin"], ["CenterWater"], "ready").unwrap();
        sm.add_state(
            StateSpec::new("first")
                .timer(0.02)
                .on("Tup", "second")
                .output_on("CenterWater"),
        )
        .unwrap();
        sm.add_state(
            StateSpec::new("second")
                .timer(0.02)
                .on("Tup", "ready")
                .output_off("CenterWater"),
        )
        .unwrap();
        sm
    }

    #[tokio::test]
    async fn start_without_table_fails() {
        let mut sim = SimulatedDevice::new();
        assert!(matches!(sim.start().await, Err(DeviceError::NoTable)));
    }

    #[tokio::test]
    async fn poll_before_start_is_empty() {
        let mut sim = SimulatedDevice::new();
        sim.upload(&upload_payload(&timed_chain())).await.unwrap();
        assert!(sim.poll().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_payload_is_rejected() {
        let mut sim = SimulatedDevice::new();
        assert!(matches!(
            sim.upload(&[0xff, 0x00, 0x13]).await,
            Err(DeviceError::BadTable(_))
        ));
    }

    #[tokio::test]
    async fn expired_timers_chain_with_true_deadlines() {
        let mut sim = SimulatedDevice::new();
        sim.upload(&upload_payload(&timed_chain())).await.unwrap();
        sim.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let events = sim.poll().await.unwrap();

        // Both timers expired within the sleep: first -> second -> ready.
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.label == TIMER_EVENT));
        assert!(events[0].timestamp < events[1].timestamp);
        assert_eq!(sim.state_index(), 2);

        // Ready state has no timer; nothing further ever fires.
        assert!(sim.poll().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn entry_actions_drive_the_output_lines() {
        let mut sim = SimulatedDevice::new();
        sim.upload(&upload_payload(&timed_chain())).await.unwrap();
        sim.start().await.unwrap();
        assert_eq!(sim.output_lines(), &[true]);

        tokio::time::sleep(Duration::from_millis(200)).await;
        sim.poll().await.unwrap();
        assert_eq!(sim.output_lines(), &[false]);
    }

    #[tokio::test]
    async fn injected_inputs_transition_the_table() {
        let mut sm = StateMatrix::new(["Cin"], Vec::<String>::new(), "ready").unwrap();
        sm.add_state(StateSpec::new("wait").on("Cin", "ready")).unwrap();

        let mut sim = SimulatedDevice::new();
        let handle = sim.handle();
        sim.upload(&upload_payload(&sm)).await.unwrap();
        sim.start().await.unwrap();

        handle.input("Cin");
        let events = sim.poll().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label, "Cin");
        assert_eq!(sim.state_index(), 1);
    }

    #[tokio::test]
    async fn unrouted_inputs_are_reported_but_hold_state() {
        let mut sm = StateMatrix::new(["Cin", "Lin"], Vec::<String>::new(), "ready").unwrap();
        sm.add_state(StateSpec::new("wait").on("Cin", "ready")).unwrap();

        let mut sim = SimulatedDevice::new();
        let handle = sim.handle();
        sim.upload(&upload_payload(&sm)).await.unwrap();
        sim.start().await.unwrap();

        handle.input("Lin");
        let events = sim.poll().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(sim.state_index(), 0);
    }

    #[tokio::test]
    async fn restart_keeps_the_device_clock() {
        let mut sim = SimulatedDevice::new();
        sim.upload(&upload_payload(&timed_chain())).await.unwrap();
        sim.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let first = sim.poll().await.unwrap();
        assert!(!first.is_empty());

        // Second trial: state resets, clock does not.
        sim.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let second = sim.poll().await.unwrap();
        assert!(!second.is_empty());
        assert!(second[0].timestamp > first.last().unwrap().timestamp);
    }
}
