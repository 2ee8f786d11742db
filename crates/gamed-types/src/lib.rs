//! Plain domain types for the game grains. No IO, no async.

pub mod blueprint;
pub mod duration;
pub mod envelope;
pub mod identity;

pub use blueprint::{
    BLUEPRINT_HOUSE, Blueprint, BlueprintRegistry, Quantities, RESOURCE_WOOD, RegistryError,
};
pub use duration::{DurationError, parse_duration};
pub use envelope::{
    BuildRequest, Context, GrainResponse, KEY_BLUEPRINT, KEY_BUILDINGS, KEY_ERROR, KEY_GRAIN_ID,
    KEY_POPULATION, KEY_RESOURCES, KEY_TIMER_ID, ScheduleRequest, Status, now_wallclock_ns,
};
pub use identity::{GrainAddress, GrainKind, inventory_grain_id, new_scheduler_grain_id};
