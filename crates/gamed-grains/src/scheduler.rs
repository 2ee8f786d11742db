//! Scheduler grain: deferred events that notify a reply target when they expire.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gamed_store::{DynStore, GrainStoreExt};
use gamed_types::{
    Context, DurationError, GrainAddress, GrainKind, GrainResponse, KEY_TIMER_ID,
    ScheduleRequest, now_wallclock_ns, parse_duration,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Notify, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::GrainError;
use crate::grain::Grain;
use crate::notifier::{ExpiryNotifier, NotificationSink};
use crate::timer_store::{Countdown, PersistedTimer, Timer, TimerStore};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("reply topic shouldn't be empty")]
    MissingReplyTarget,
    #[error("failed to parse duration: {0}")]
    InvalidDuration(#[from] DurationError),
    #[error("scheduler is not running")]
    NotRunning,
}

#[derive(Debug)]
pub enum SchedulerMsg {
    Schedule {
        request: ScheduleRequest,
        resp: oneshot::Sender<GrainResponse>,
    },
}

pub struct SchedulerGrain {
    address: GrainAddress,
    store: DynStore,
    sink: Arc<dyn NotificationSink>,
    timers: Arc<TimerStore>,
    notifier: Option<ExpiryNotifier>,
    idle: Arc<Notify>,
}

impl SchedulerGrain {
    pub fn new(id: Uuid, store: DynStore, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            address: GrainAddress::scheduler(id),
            store,
            sink,
            timers: Arc::new(TimerStore::new()),
            notifier: None,
            idle: Arc::new(Notify::new()),
        }
    }

    pub fn timers(&self) -> &Arc<TimerStore> {
        &self.timers
    }

    pub fn is_running(&self) -> bool {
        self.notifier.is_some()
    }

    /// Store a timer and start its countdown. Returns the timer id.
    pub fn schedule(&self, request: &ScheduleRequest) -> Result<Uuid, ScheduleError> {
        if request.reply.is_empty() {
            return Err(ScheduleError::MissingReplyTarget);
        }
        let after = parse_duration(&request.duration)?;
        let notifier = self.notifier.as_ref().ok_or(ScheduleError::NotRunning)?;

        let deadline_ns = now_wallclock_ns().saturating_add(after.as_nanos() as u64);
        let id = self.timers.add(Timer::new(
            request.reply.clone(),
            request.payload.clone(),
            deadline_ns,
        ));
        self.arm(id, after, notifier);
        info!(grain = %self.address, timer = %id, duration = %request.duration, "created timer");
        Ok(id)
    }

    fn arm(&self, id: Uuid, after: Duration, notifier: &ExpiryNotifier) {
        let countdown = Countdown::start(id, after, notifier.sender());
        if let Err(countdown) = self.timers.arm(id, countdown) {
            // Already fired and collected; the watcher has nothing left to do.
            drop(countdown);
        }
    }

    /// Re-add persisted timers under their original ids with whatever time they
    /// have left. Overdue timers fire immediately.
    fn rehydrate(&self, persisted: Vec<PersistedTimer>, notifier: &ExpiryNotifier) -> usize {
        let now = now_wallclock_ns();
        let count = persisted.len();
        for record in persisted {
            let remaining = Duration::from_nanos(record.deadline_ns.saturating_sub(now));
            let (id, timer) = record.into_timer();
            self.timers.restore(id, timer);
            self.arm(id, remaining, notifier);
        }
        count
    }
}

#[async_trait]
impl Grain for SchedulerGrain {
    type Msg = SchedulerMsg;

    const KIND: GrainKind = GrainKind::Scheduler;

    fn address(&self) -> GrainAddress {
        self.address
    }

    async fn init(&mut self) -> Result<(), GrainError> {
        let persisted = self
            .store
            .load::<Vec<PersistedTimer>>(&self.address)?
            .unwrap_or_default();
        let notifier = ExpiryNotifier::start(
            Arc::clone(&self.timers),
            Arc::clone(&self.sink),
            Arc::clone(&self.idle),
        );
        let restored = self.rehydrate(persisted, &notifier);
        if restored > 0 {
            info!(grain = %self.address, restored, "rehydrated pending timers");
        }
        self.notifier = Some(notifier);
        Ok(())
    }

    async fn receive(&mut self, msg: SchedulerMsg) {
        match msg {
            SchedulerMsg::Schedule { request, resp } => {
                let response = match self.schedule(&request) {
                    Ok(id) => {
                        let mut context = Context::new();
                        context.insert(KEY_TIMER_ID.into(), Value::String(id.to_string()));
                        GrainResponse::ok(context)
                    }
                    Err(err) => {
                        debug!(grain = %self.address, "schedule rejected: {err}");
                        GrainResponse::error(err)
                    }
                };
                let _ = resp.send(response);
            }
        }
    }

    /// Stop every countdown and wait for the watchers, persist the outstanding
    /// timers, then close the expiry channel and let the consumer drain. Ids
    /// already queued when the countdowns stopped are delivered by the drain,
    /// so the timers are saved again once it finishes.
    async fn terminate(&mut self) -> Result<(), GrainError> {
        let Some(notifier) = self.notifier.take() else {
            return Err(GrainError::NotRunning(self.address.to_string()));
        };

        let countdowns = self.timers.take_countdowns();
        let stopped = countdowns.len();
        for (id, countdown) in countdowns {
            debug!(grain = %self.address, timer = %id, "stopping timer");
            countdown.stop().await;
        }

        let before_drain = self.timers.len();
        let saved = self.store.save(&self.address, &self.timers.snapshot());
        if let Err(err) = &saved {
            warn!(grain = %self.address, "failed to persist timers: {err}");
        }

        let delivered = notifier.close().await;
        let pending = self.timers.len();
        let saved = if saved.is_err() || pending != before_drain {
            self.store.save(&self.address, &self.timers.snapshot())
        } else {
            saved
        };
        if let Err(err) = &saved {
            warn!(grain = %self.address, "failed to persist drained timers: {err}");
        }

        info!(
            grain = %self.address,
            stopped,
            delivered,
            pending,
            "scheduler terminated"
        );
        saved.map_err(GrainError::from)
    }

    fn idle_signal(&self) -> Option<Arc<Notify>> {
        Some(Arc::clone(&self.idle))
    }

    /// Every timer has fired and been delivered.
    fn is_idle(&self) -> bool {
        self.timers.is_empty()
    }
}
