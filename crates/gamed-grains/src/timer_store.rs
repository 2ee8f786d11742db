//! Pending timers of a scheduler grain, and the countdowns that fire them.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use gamed_types::Context;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::lock;

/// A single-fire countdown: a watcher task that sleeps for the duration, then
/// enqueues the timer id exactly once.
#[derive(Debug)]
pub struct Countdown {
    stop: oneshot::Sender<()>,
    watcher: JoinHandle<()>,
}

impl Countdown {
    /// Must be called from within a tokio runtime.
    pub fn start(id: Uuid, after: Duration, fired: mpsc::Sender<Uuid>) -> Self {
        let (stop, mut stop_rx) = oneshot::channel::<()>();
        let watcher = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = &mut stop_rx => {}
                () = async {
                    tokio::time::sleep(after).await;
                    if fired.send(id).await.is_err() {
                        tracing::warn!(timer = %id, "expiry channel closed before timer fired");
                    }
                } => {}
            }
        });
        Self { stop, watcher }
    }

    /// Stop the countdown and wait for its watcher to exit. If the countdown had
    /// already fired this just waits for the watcher to finish.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.watcher.await;
    }
}

/// A pending deferred event.
#[derive(Debug)]
pub struct Timer {
    pub reply_target: String,
    pub payload: Context,
    /// Absolute wall-clock deadline, nanoseconds since the Unix epoch.
    pub deadline_ns: u64,
    countdown: Option<Countdown>,
}

impl Timer {
    pub fn new(reply_target: impl Into<String>, payload: Context, deadline_ns: u64) -> Self {
        Self {
            reply_target: reply_target.into(),
            payload,
            deadline_ns,
            countdown: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.countdown.is_some()
    }
}

/// Persistable form of a [`Timer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedTimer {
    pub id: Uuid,
    pub deadline_ns: u64,
    pub reply_target: String,
    pub payload: Context,
}

impl PersistedTimer {
    pub fn into_timer(self) -> (Uuid, Timer) {
        (
            self.id,
            Timer::new(self.reply_target, self.payload, self.deadline_ns),
        )
    }
}

#[derive(Debug, Default)]
pub struct TimerStore {
    timers: Mutex<HashMap<Uuid, Timer>>,
}

impl TimerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under a freshly generated id.
    pub fn add(&self, timer: Timer) -> Uuid {
        let mut timers = lock(&self.timers);
        let mut id = Uuid::new_v4();
        while timers.contains_key(&id) {
            id = Uuid::new_v4();
        }
        timers.insert(id, timer);
        id
    }

    /// Insert under a known id, replacing any existing entry.
    pub fn restore(&self, id: Uuid, timer: Timer) {
        lock(&self.timers).insert(id, timer);
    }

    /// Attach the countdown for `id`. Hands the countdown back if the timer is
    /// already gone (it fired and was collected before it could be attached).
    pub fn arm(&self, id: Uuid, countdown: Countdown) -> Result<(), Countdown> {
        match lock(&self.timers).get_mut(&id) {
            Some(timer) => {
                timer.countdown = Some(countdown);
                Ok(())
            }
            None => Err(countdown),
        }
    }

    /// Atomic lookup-and-delete.
    pub fn remove(&self, id: &Uuid) -> Option<Timer> {
        lock(&self.timers).remove(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        lock(&self.timers).contains_key(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.timers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Detach every countdown, leaving the timer records in place.
    pub fn take_countdowns(&self) -> Vec<(Uuid, Countdown)> {
        lock(&self.timers)
            .iter_mut()
            .filter_map(|(id, timer)| timer.countdown.take().map(|c| (*id, c)))
            .collect()
    }

    /// Records without their countdowns, ordered by deadline.
    pub fn snapshot(&self) -> Vec<PersistedTimer> {
        let mut out: Vec<PersistedTimer> = lock(&self.timers)
            .iter()
            .map(|(id, timer)| PersistedTimer {
                id: *id,
                deadline_ns: timer.deadline_ns,
                reply_target: timer.reply_target.clone(),
                payload: timer.payload.clone(),
            })
            .collect();
        out.sort_by_key(|t| (t.deadline_ns, t.id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_once() {
        let store = TimerStore::new();
        let id = store.add(Timer::new("topic", Context::new(), 10));
        assert!(store.contains(&id));
        assert_eq!(store.len(), 1);

        let timer = store.remove(&id).expect("present");
        assert_eq!(timer.reply_target, "topic");
        assert!(store.remove(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let store = TimerStore::new();
        let a = store.add(Timer::new("a", Context::new(), 0));
        let b = store.add(Timer::new("b", Context::new(), 0));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn countdown_fires_once() {
        let (tx, mut rx) = mpsc::channel(1);
        let id = Uuid::new_v4();
        let countdown = Countdown::start(id, Duration::from_millis(10), tx);
        assert_eq!(rx.recv().await, Some(id));
        countdown.stop().await;
        // The watcher held the only sender; it is gone once stopped.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn stopped_countdown_never_fires() {
        let (tx, mut rx) = mpsc::channel(1);
        let countdown = Countdown::start(Uuid::new_v4(), Duration::from_secs(60), tx);
        countdown.stop().await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn take_countdowns_keeps_records() {
        let (tx, _rx) = mpsc::channel(1);
        let store = TimerStore::new();
        let id = store.add(Timer::new("x", Context::new(), 0));
        store
            .arm(id, Countdown::start(id, Duration::from_secs(60), tx.clone()))
            .unwrap();

        let taken = store.take_countdowns();
        assert_eq!(taken.len(), 1);
        for (_, countdown) in taken {
            countdown.stop().await;
        }
        assert!(store.contains(&id));
        assert!(store.take_countdowns().is_empty());

        let orphan = Countdown::start(Uuid::new_v4(), Duration::from_secs(60), tx);
        let rejected = store.arm(Uuid::new_v4(), orphan).unwrap_err();
        rejected.stop().await;
    }
}
