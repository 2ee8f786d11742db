//! Turns fired timer ids into notifications for their reply targets.
//!
//! One consumer task per scheduler grain reads ids from a single-slot channel in
//! the order the countdowns fired. Each id is looked up and removed from the timer
//! store; ids whose record is already gone are dropped without error. Once a
//! delivery leaves the store empty the consumer raises the idle signal.

use std::sync::Arc;

use async_trait::async_trait;
use gamed_types::Context;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::timer_store::TimerStore;

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub timer_id: Uuid,
    pub reply_target: String,
    pub payload: Context,
}

/// Delivery transport for expiry notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Logs each notification instead of transmitting it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: Notification) -> anyhow::Result<()> {
        info!(
            timer = %notification.timer_id,
            reply_target = %notification.reply_target,
            payload = %serde_json::Value::Object(notification.payload),
            "timer expired"
        );
        Ok(())
    }
}

/// Forwards notifications into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn deliver(&self, notification: Notification) -> anyhow::Result<()> {
        self.tx
            .send(notification)
            .map_err(|_| anyhow::anyhow!("notification receiver dropped"))
    }
}

pub struct ExpiryNotifier {
    fired_tx: mpsc::Sender<Uuid>,
    consumer: JoinHandle<usize>,
}

impl ExpiryNotifier {
    /// Spawn the consumer. Must be called from within a tokio runtime.
    pub fn start(
        timers: Arc<TimerStore>,
        sink: Arc<dyn NotificationSink>,
        idle: Arc<Notify>,
    ) -> Self {
        let (fired_tx, fired_rx) = mpsc::channel(1);
        let consumer = tokio::spawn(consume(fired_rx, timers, sink, idle));
        Self { fired_tx, consumer }
    }

    /// Sender for countdown watchers.
    pub fn sender(&self) -> mpsc::Sender<Uuid> {
        self.fired_tx.clone()
    }

    /// Drop our sender and wait for the consumer to drain what is already queued.
    /// The channel only closes once every watcher holding a sender has exited, so
    /// callers stop all countdowns first. Returns the number of notifications
    /// delivered over the notifier's lifetime.
    pub async fn close(self) -> usize {
        drop(self.fired_tx);
        match self.consumer.await {
            Ok(delivered) => delivered,
            Err(err) => {
                warn!("expiry consumer failed: {err}");
                0
            }
        }
    }
}

async fn consume(
    mut fired_rx: mpsc::Receiver<Uuid>,
    timers: Arc<TimerStore>,
    sink: Arc<dyn NotificationSink>,
    idle: Arc<Notify>,
) -> usize {
    let mut delivered = 0;
    while let Some(id) = fired_rx.recv().await {
        let Some(timer) = timers.remove(&id) else {
            debug!(timer = %id, "timer already removed, dropping expiry");
            continue;
        };
        let notification = Notification {
            timer_id: id,
            reply_target: timer.reply_target,
            payload: timer.payload,
        };
        match sink.deliver(notification).await {
            Ok(()) => delivered += 1,
            Err(err) => warn!(timer = %id, "failed to deliver expiry notification: {err}"),
        }
        if timers.is_empty() {
            idle.notify_one();
        }
    }
    debug!(delivered, "expiry consumer drained");
    delivered
}
