//! Inventory grain: one per user, holding resources, population, and buildings.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use gamed_store::{DynStore, GrainStoreExt, StoreError};
use gamed_types::{
    BlueprintRegistry, BuildRequest, Context, GrainAddress, GrainKind, GrainResponse,
    KEY_BUILDINGS, KEY_POPULATION, KEY_RESOURCES, Quantities, RESOURCE_WOOD,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::construction::ConstructionStore;
use crate::error::GrainError;
use crate::grain::Grain;
use crate::ledger::{LedgerError, ResourceLedger};

pub const SEED_POPULATION: u64 = 100;
pub const SEED_WOOD: u64 = 100;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("requested blueprint not found")]
    MissingBlueprint,
    #[error("requested blueprint not found: {0}")]
    UnknownBlueprint(String),
    /// A shortfall, or a reservation that could not be undone.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("failed to persist inventory: {0}")]
    Persistence(#[from] StoreError),
}

/// Point-in-time copy of an inventory. Also the persisted form.
///
/// Resources and buildings are copied under their own locks, so the two halves
/// are not one atomic view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub population: u64,
    pub resources: Quantities,
    pub buildings: BTreeMap<String, u64>,
}

impl InventorySnapshot {
    pub fn seed() -> Self {
        Self {
            population: SEED_POPULATION,
            resources: Quantities::from([(RESOURCE_WOOD.to_string(), SEED_WOOD)]),
            buildings: BTreeMap::new(),
        }
    }

    pub fn to_context(&self) -> Context {
        let to_object = |map: &BTreeMap<String, u64>| {
            Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(*v)))
                    .collect(),
            )
        };
        let mut context = Context::new();
        context.insert(KEY_POPULATION.into(), Value::from(self.population));
        context.insert(KEY_RESOURCES.into(), to_object(&self.resources));
        context.insert(KEY_BUILDINGS.into(), to_object(&self.buildings));
        context
    }
}

#[derive(Debug)]
pub enum InventoryMsg {
    StartBuild {
        request: BuildRequest,
        resp: oneshot::Sender<GrainResponse>,
    },
    Describe {
        resp: oneshot::Sender<GrainResponse>,
    },
}

pub struct InventoryGrain {
    address: GrainAddress,
    registry: Arc<BlueprintRegistry>,
    store: DynStore,
    // Read-only for now; nothing consumes or grows population yet.
    population: u64,
    resources: ResourceLedger,
    buildings: ConstructionStore,
}

impl InventoryGrain {
    pub fn new(id: uuid::Uuid, registry: Arc<BlueprintRegistry>, store: DynStore) -> Self {
        Self {
            address: GrainAddress::inventory(id),
            registry,
            store,
            population: 0,
            resources: ResourceLedger::default(),
            buildings: ConstructionStore::new(),
        }
    }

    fn restore(&mut self, snapshot: InventorySnapshot) {
        self.population = snapshot.population;
        self.resources.reset(snapshot.resources);
        self.buildings.reset(snapshot.buildings);
    }

    /// Reserve the blueprint's cost and record one more completed building.
    ///
    /// The declared build time is not waited on; the building counts as finished
    /// as soon as the state is saved.
    pub fn start_build(&self, request: &BuildRequest) -> Result<(), InventoryError> {
        let name = request
            .blueprint
            .as_deref()
            .ok_or(InventoryError::MissingBlueprint)?;
        let blueprint = self
            .registry
            .get(name)
            .ok_or_else(|| InventoryError::UnknownBlueprint(name.to_string()))?;

        let mut reservation = self.resources.reserve(&blueprint.cost)?;

        let mut next = self.describe();
        *next.buildings.entry(blueprint.name.clone()).or_insert(0) += 1;
        if let Err(err) = self.store.save(&self.address, &next) {
            warn!(grain = %self.address, blueprint = %blueprint.name, "persist failed, rolling back: {err}");
            reservation.rollback()?;
            return Err(err.into());
        }
        reservation.commit();
        self.buildings.build(&blueprint.name);

        debug!(
            grain = %self.address,
            blueprint = %blueprint.name,
            count = self.buildings.count(&blueprint.name),
            "building completed"
        );
        Ok(())
    }

    pub fn describe(&self) -> InventorySnapshot {
        InventorySnapshot {
            population: self.population,
            resources: self.resources.quantities(),
            buildings: self.buildings.counts(),
        }
    }
}

#[async_trait]
impl Grain for InventoryGrain {
    type Msg = InventoryMsg;

    const KIND: GrainKind = GrainKind::Inventory;

    fn address(&self) -> GrainAddress {
        self.address
    }

    async fn init(&mut self) -> Result<(), GrainError> {
        match self.store.load::<InventorySnapshot>(&self.address)? {
            Some(snapshot) => {
                info!(grain = %self.address, "restored inventory");
                self.restore(snapshot);
            }
            None => {
                debug!(grain = %self.address, "seeding new inventory");
                self.restore(InventorySnapshot::seed());
            }
        }
        Ok(())
    }

    async fn receive(&mut self, msg: InventoryMsg) {
        match msg {
            InventoryMsg::StartBuild { request, resp } => {
                let response = match self.start_build(&request) {
                    Ok(()) => GrainResponse::empty_ok(),
                    Err(err) => {
                        debug!(grain = %self.address, "build rejected: {err}");
                        GrainResponse::error(err)
                    }
                };
                let _ = resp.send(response);
            }
            InventoryMsg::Describe { resp } => {
                let _ = resp.send(GrainResponse::ok(self.describe().to_context()));
            }
        }
    }

    async fn terminate(&mut self) -> Result<(), GrainError> {
        self.store.save(&self.address, &self.describe())?;
        info!(grain = %self.address, "inventory saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamed_store::{GrainStore, MemStore, StoreResult};
    use gamed_types::{BLUEPRINT_HOUSE, Blueprint};
    use serde_json::json;
    use std::io;
    use uuid::Uuid;

    async fn fresh(store: DynStore) -> InventoryGrain {
        let mut grain = InventoryGrain::new(
            Uuid::new_v4(),
            Arc::new(BlueprintRegistry::builtin()),
            store,
        );
        grain.init().await.unwrap();
        grain
    }

    struct FailingStore;

    impl GrainStore for FailingStore {
        fn save_bytes(&self, _: &GrainAddress, _: &[u8]) -> StoreResult<()> {
            Err(StoreError::Io {
                path: "memory://failing".into(),
                source: io::Error::other("disk full"),
            })
        }

        fn load_bytes(&self, _: &GrainAddress) -> StoreResult<Option<Vec<u8>>> {
            Ok(None)
        }

        fn remove(&self, _: &GrainAddress) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn init_seeds_population_and_wood() {
        let grain = fresh(Arc::new(MemStore::new())).await;
        assert_eq!(grain.describe(), InventorySnapshot::seed());
        assert_eq!(grain.describe().resources.get("wood"), Some(&100));
        assert_eq!(grain.describe().population, 100);
    }

    #[tokio::test]
    async fn houses_until_wood_runs_out() {
        let grain = fresh(Arc::new(MemStore::new())).await;
        let house = BuildRequest::new(BLUEPRINT_HOUSE);

        grain.start_build(&house).unwrap();
        assert_eq!(grain.resources.amount("wood"), 70);
        assert_eq!(grain.buildings.count("House"), 1);

        grain.start_build(&house).unwrap();
        assert_eq!(grain.resources.amount("wood"), 40);
        assert_eq!(grain.buildings.count("House"), 2);

        grain.start_build(&house).unwrap();
        assert_eq!(grain.resources.amount("wood"), 10);
        assert_eq!(grain.buildings.count("House"), 3);

        let err = grain.start_build(&house).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::Ledger(LedgerError::InsufficientResource(ref kind)) if kind == "wood"
        ));
        assert_eq!(err.to_string(), "not enough wood");
        assert_eq!(grain.resources.amount("wood"), 10);
        assert_eq!(grain.buildings.count("House"), 3);
    }

    #[tokio::test]
    async fn exact_funds_succeed() {
        let registry = BlueprintRegistry::from_blueprints([Blueprint::new(
            "Hall",
            Quantities::from([("wood".to_string(), 100)]),
            "2h",
        )
        .unwrap()])
        .unwrap();
        let mut grain =
            InventoryGrain::new(Uuid::new_v4(), Arc::new(registry), Arc::new(MemStore::new()));
        grain.init().await.unwrap();
        grain.start_build(&BuildRequest::new("Hall")).unwrap();
        assert_eq!(grain.resources.amount("wood"), 0);
    }

    #[tokio::test]
    async fn unknown_and_missing_blueprints_mutate_nothing() {
        let grain = fresh(Arc::new(MemStore::new())).await;
        let before = grain.describe();

        let err = grain.start_build(&BuildRequest::new("Castle")).unwrap_err();
        assert!(matches!(err, InventoryError::UnknownBlueprint(ref n) if n == "Castle"));

        let err = grain.start_build(&BuildRequest::default()).unwrap_err();
        assert!(matches!(err, InventoryError::MissingBlueprint));
        assert_eq!(err.to_string(), "requested blueprint not found");

        assert_eq!(grain.describe(), before);
    }

    #[test]
    fn double_rollback_is_not_reported_as_a_shortfall() {
        let wood = Quantities::from([(RESOURCE_WOOD.to_string(), 30)]);
        let ledger = ResourceLedger::new(wood.clone());
        let mut reservation = ledger.reserve(&wood).unwrap();
        reservation.rollback().unwrap();

        let err = InventoryError::from(reservation.rollback().unwrap_err());
        assert!(matches!(
            err,
            InventoryError::Ledger(LedgerError::AlreadyRolledBack)
        ));
        assert_eq!(err.to_string(), "reservation already rolled back");
        assert_eq!(ledger.amount("wood"), 30);
    }

    #[tokio::test]
    async fn failed_persist_rolls_back_reservation() {
        let grain = fresh(Arc::new(FailingStore)).await;
        let err = grain
            .start_build(&BuildRequest::new(BLUEPRINT_HOUSE))
            .unwrap_err();
        assert!(matches!(err, InventoryError::Persistence(_)));
        assert_eq!(grain.describe(), InventorySnapshot::seed());
    }

    #[tokio::test]
    async fn state_survives_terminate_and_reinit() {
        let store = Arc::new(MemStore::new());
        let id = Uuid::new_v4();
        let registry = Arc::new(BlueprintRegistry::builtin());

        let mut grain = InventoryGrain::new(id, Arc::clone(&registry), store.clone());
        grain.init().await.unwrap();
        grain.start_build(&BuildRequest::new(BLUEPRINT_HOUSE)).unwrap();
        grain.terminate().await.unwrap();

        let mut revived = InventoryGrain::new(id, registry, store);
        revived.init().await.unwrap();
        assert_eq!(revived.resources.amount("wood"), 70);
        assert_eq!(revived.buildings.count("House"), 1);
    }

    #[tokio::test]
    async fn messages_answer_with_envelopes() {
        let mut grain = fresh(Arc::new(MemStore::new())).await;

        let (tx, rx) = oneshot::channel();
        grain
            .receive(InventoryMsg::StartBuild {
                request: BuildRequest::new("Castle"),
                resp: tx,
            })
            .await;
        let resp = rx.await.unwrap();
        assert!(!resp.is_ok());
        assert_eq!(
            resp.error_message(),
            Some("requested blueprint not found: Castle")
        );

        let (tx, rx) = oneshot::channel();
        grain
            .receive(InventoryMsg::StartBuild {
                request: BuildRequest::new(BLUEPRINT_HOUSE),
                resp: tx,
            })
            .await;
        let resp = rx.await.unwrap();
        assert!(resp.is_ok());
        assert!(resp.context.is_empty());

        let (tx, rx) = oneshot::channel();
        grain.receive(InventoryMsg::Describe { resp: tx }).await;
        let resp = rx.await.unwrap();
        assert_eq!(
            Value::Object(resp.context),
            json!({
                "population": 100,
                "resources": {"wood": 70},
                "buildings": {"House": 1},
            })
        );
    }
}
