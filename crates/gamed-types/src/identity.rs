//! Grain addressing.
//!
//! Inventory grains are keyed deterministically by user, so the same user always
//! reaches the same inventory. Scheduler grains are keyed by a random seed: callers
//! that need to talk to the same scheduler twice must keep the id they were given.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const INVENTORY_NAMESPACE: &str = "inventory";
const SCHEDULER_NAMESPACE: &str = "scheduler";

fn namespace(name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes())
}

pub fn inventory_grain_id(user_id: Uuid) -> Uuid {
    Uuid::new_v5(
        &namespace(INVENTORY_NAMESPACE),
        user_id.to_string().as_bytes(),
    )
}

/// A fresh scheduler grain id. Not reproducible: every call addresses a new grain.
pub fn new_scheduler_grain_id() -> Uuid {
    Uuid::new_v5(
        &namespace(SCHEDULER_NAMESPACE),
        Uuid::new_v4().to_string().as_bytes(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrainKind {
    Inventory,
    Scheduler,
}

impl GrainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrainKind::Inventory => "inventory",
            GrainKind::Scheduler => "scheduler",
        }
    }
}

impl fmt::Display for GrainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrainAddress {
    pub kind: GrainKind,
    pub id: Uuid,
}

impl GrainAddress {
    pub fn new(kind: GrainKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn inventory(id: Uuid) -> Self {
        Self::new(GrainKind::Inventory, id)
    }

    pub fn scheduler(id: Uuid) -> Self {
        Self::new(GrainKind::Scheduler, id)
    }
}

impl fmt::Display for GrainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
