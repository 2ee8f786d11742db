//! Grain directory: activates grains on first use and routes calls to them.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gamed_grains::{
    Grain, InventoryGrain, InventoryMsg, LogSink, NotificationSink, SchedulerGrain, SchedulerMsg,
};
use gamed_store::{DynStore, FsStore, MemStore};
use gamed_types::{BlueprintRegistry, GrainAddress, GrainKind, inventory_grain_id};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{InventoryClient, SchedulerClient};
use crate::config::HostConfig;
use crate::error::HostError;
use crate::mailbox::{Activation, Mailbox};

/// Shared dependencies handed to every grain the host activates.
#[derive(Clone)]
pub struct HostServices {
    pub registry: Arc<BlueprintRegistry>,
    pub store: DynStore,
    pub sink: Arc<dyn NotificationSink>,
}

impl HostServices {
    /// Built-in blueprints, in-memory state, logged notifications.
    pub fn in_memory() -> Self {
        Self {
            registry: Arc::new(BlueprintRegistry::builtin()),
            store: Arc::new(MemStore::new()),
            sink: Arc::new(LogSink),
        }
    }

    pub fn from_config(config: &HostConfig) -> Result<Self, HostError> {
        let registry = match &config.blueprints {
            Some(path) => BlueprintRegistry::from_json_path(path)?,
            None => BlueprintRegistry::builtin(),
        };
        let store: DynStore = match &config.store_dir {
            Some(dir) => Arc::new(FsStore::open(dir)?),
            None => Arc::new(MemStore::new()),
        };
        info!(
            blueprints = registry.len(),
            persistent = config.store_dir.is_some(),
            "host services ready"
        );
        Ok(Self {
            registry: Arc::new(registry),
            store,
            sink: Arc::new(LogSink),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }
}

struct Directory<M> {
    active: Mutex<HashMap<Uuid, Activation<M>>>,
}

impl<M: Send + 'static> Directory<M> {
    fn new() -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Live mailbox for `id`, activating a new grain when there is none. The map
    /// stays locked across `init` so one id never gets two activations. A grain
    /// that deactivated itself is allowed to finish `terminate` first, so the
    /// new activation loads what it persisted.
    async fn get_or_activate<G>(
        &self,
        id: Uuid,
        capacity: usize,
        make: impl FnOnce() -> G,
    ) -> Result<Mailbox<M>, HostError>
    where
        G: Grain<Msg = M>,
    {
        let mut active = self.active.lock().await;
        if let Some(activation) = active.get(&id) {
            if activation.mailbox.is_alive() {
                return Ok(activation.mailbox.clone());
            }
        }
        if let Some(retired) = active.remove(&id) {
            if let Err(err) = retired.task.await {
                warn!(grain = %retired.mailbox.address(), "grain task failed: {err}");
            }
        }
        prune(&mut active);
        let activation = Mailbox::activate(make(), capacity).await?;
        let mailbox = activation.mailbox.clone();
        active.insert(id, activation);
        Ok(mailbox)
    }

    async fn take(&self, id: &Uuid) -> Option<Mailbox<M>> {
        self.active.lock().await.remove(id).map(|a| a.mailbox)
    }

    async fn drain(&self) -> Vec<Mailbox<M>> {
        self.active
            .lock()
            .await
            .drain()
            .map(|(_, a)| a.mailbox)
            .collect()
    }

    /// Live activations. Entries whose grain has finished terminating are dropped.
    async fn len(&self) -> usize {
        let mut active = self.active.lock().await;
        prune(&mut active);
        active.values().filter(|a| a.mailbox.is_alive()).count()
    }
}

fn prune<M: Send + 'static>(active: &mut HashMap<Uuid, Activation<M>>) {
    active.retain(|_, a| a.mailbox.is_alive() || !a.task.is_finished());
}

pub struct GrainHost {
    services: HostServices,
    mailbox_capacity: usize,
    request_timeout: Duration,
    closed: AtomicBool,
    inventories: Directory<InventoryMsg>,
    schedulers: Directory<SchedulerMsg>,
}

impl GrainHost {
    pub fn new(services: HostServices) -> Self {
        let defaults = HostConfig::default();
        Self {
            services,
            mailbox_capacity: defaults.mailbox_capacity,
            request_timeout: defaults.request_timeout,
            closed: AtomicBool::new(false),
            inventories: Directory::new(),
            schedulers: Directory::new(),
        }
    }

    pub fn from_config(config: &HostConfig) -> Result<Self, HostError> {
        Ok(Self::new(HostServices::from_config(config)?)
            .with_mailbox_capacity(config.mailbox_capacity)
            .with_request_timeout(config.request_timeout))
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn services(&self) -> &HostServices {
        &self.services
    }

    pub fn registry(&self) -> &BlueprintRegistry {
        &self.services.registry
    }

    /// Client for the inventory owned by `user_id`.
    pub async fn inventory(&self, user_id: Uuid) -> Result<InventoryClient, HostError> {
        self.inventory_by_id(inventory_grain_id(user_id)).await
    }

    pub async fn inventory_by_id(&self, id: Uuid) -> Result<InventoryClient, HostError> {
        self.ensure_open()?;
        let services = &self.services;
        let mailbox = self
            .inventories
            .get_or_activate(id, self.mailbox_capacity, || {
                InventoryGrain::new(
                    id,
                    Arc::clone(&services.registry),
                    Arc::clone(&services.store),
                )
            })
            .await?;
        Ok(InventoryClient::new(mailbox, self.request_timeout))
    }

    pub async fn scheduler(&self, id: Uuid) -> Result<SchedulerClient, HostError> {
        self.ensure_open()?;
        let services = &self.services;
        let mailbox = self
            .schedulers
            .get_or_activate(id, self.mailbox_capacity, || {
                SchedulerGrain::new(id, Arc::clone(&services.store), Arc::clone(&services.sink))
            })
            .await?;
        Ok(SchedulerClient::new(mailbox, self.request_timeout))
    }

    /// Number of live activations, inventories and schedulers combined.
    pub async fn active_count(&self) -> usize {
        self.inventories.len().await + self.schedulers.len().await
    }

    /// Terminate one grain. Returns `false` when it was not active.
    pub async fn deactivate(&self, address: GrainAddress) -> Result<bool, HostError> {
        let terminated = match address.kind {
            GrainKind::Inventory => match self.inventories.take(&address.id).await {
                Some(mailbox) => mailbox.terminate().await.map(|()| true),
                None => Ok(false),
            },
            GrainKind::Scheduler => match self.schedulers.take(&address.id).await {
                Some(mailbox) => mailbox.terminate().await.map(|()| true),
                None => Ok(false),
            },
        };
        match terminated {
            // The loop already exited on its own; nothing left to stop.
            Err(HostError::GrainUnavailable(_)) => Ok(false),
            other => other,
        }
    }

    /// Refuse new activations, then terminate every live grain. Returns the
    /// first terminate failure after attempting all of them.
    pub async fn shutdown(&self) -> Result<(), HostError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let inventories = self.inventories.drain().await;
        let schedulers = self.schedulers.drain().await;
        info!(
            inventories = inventories.len(),
            schedulers = schedulers.len(),
            "shutting down grains"
        );

        let mut first_err = None;
        let mut results = Vec::with_capacity(inventories.len() + schedulers.len());
        for mailbox in &inventories {
            results.push((mailbox.address(), mailbox.terminate().await));
        }
        for mailbox in &schedulers {
            results.push((mailbox.address(), mailbox.terminate().await));
        }
        for (address, result) in results {
            match result {
                Ok(()) | Err(HostError::GrainUnavailable(_)) => {}
                Err(err) => {
                    warn!(grain = %address, "shutdown failed: {err}");
                    first_err.get_or_insert(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn ensure_open(&self) -> Result<(), HostError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(HostError::ShuttingDown)
        } else {
            Ok(())
        }
    }
}
