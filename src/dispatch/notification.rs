//! Notifications the dispatcher emits to its host application.

use tokio::sync::mpsc;

use crate::events::EventRecord;

/// What the host needs to hear from the poll loop.
///
/// Delivery preserves per-dispatcher ordering: tics arrive strictly in
/// poll-cycle order, and `PrepareNextTrial` for trial N is delivered
/// before any tic belonging to trial N+1's execution.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// The ready state was entered: the current trial is over and the
    /// caller should prepare trial `next_trial`, using `trial_events`
    /// (the log slice for the trial that just finished), then call
    /// `ready_to_start_trial`.
    PrepareNextTrial {
        next_trial: usize,
        trial_events: Vec<EventRecord>,
    },

    /// One poll cycle completed. Carries seconds since the loop
    /// started and the records decoded this cycle; fired for liveness
    /// feedback whether or not anything happened.
    TimerTic {
        elapsed: f64,
        recent: Vec<EventRecord>,
    },
}

/// Receiving side of the notification stream.
///
/// Once `recv` returns `None` the dispatcher is gone and no further
/// notification will ever arrive.
pub struct Notifications {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl Notifications {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Notification>) -> Self {
        Self { rx }
    }

    /// Wait for the next notification.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }
}
