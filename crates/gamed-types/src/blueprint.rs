//! Static blueprint definitions and the read-only registry that serves them.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::{DurationError, parse_duration};

pub const RESOURCE_WOOD: &str = "wood";
pub const BLUEPRINT_HOUSE: &str = "House";

/// Resource kind to amount.
pub type Quantities = BTreeMap<String, u64>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read blueprints from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode blueprints: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("duplicate blueprint '{0}'")]
    Duplicate(String),
    #[error("blueprint '{name}' has an invalid build time: {source}")]
    InvalidTime {
        name: String,
        #[source]
        source: DurationError,
    },
    #[error("blueprint '{name}' requires unknown blueprint '{requirement}'")]
    UnknownRequirement { name: String, requirement: String },
}

/// On-disk shape of a blueprint entry.
#[derive(Debug, Clone, Deserialize)]
struct BlueprintDef {
    name: String,
    #[serde(default)]
    requirements: Vec<String>,
    #[serde(default)]
    cost: Quantities,
    time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blueprint {
    pub name: String,
    /// Prerequisite blueprints, in declaration order. Not checked when building.
    pub requirements: Vec<String>,
    pub cost: Quantities,
    /// Build time as written, e.g. `"1h"`.
    pub time: String,
    /// Declared build time. The build path completes synchronously and does not
    /// wait for it.
    #[serde(skip)]
    pub build_duration: Duration,
}

impl Blueprint {
    pub fn new(
        name: impl Into<String>,
        cost: Quantities,
        time: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        let time = time.into();
        let build_duration = parse_duration(&time).map_err(|source| RegistryError::InvalidTime {
            name: name.clone(),
            source,
        })?;
        Ok(Self {
            name,
            requirements: Vec::new(),
            cost,
            time,
            build_duration,
        })
    }

    pub fn with_requirements(mut self, requirements: Vec<String>) -> Self {
        self.requirements = requirements;
        self
    }
}

/// Immutable lookup table of blueprints, built once and shared.
#[derive(Debug, Clone, Default)]
pub struct BlueprintRegistry {
    blueprints: HashMap<String, Blueprint>,
}

impl BlueprintRegistry {
    pub fn from_blueprints(
        blueprints: impl IntoIterator<Item = Blueprint>,
    ) -> Result<Self, RegistryError> {
        let mut map = HashMap::new();
        for blueprint in blueprints {
            if map.contains_key(&blueprint.name) {
                return Err(RegistryError::Duplicate(blueprint.name));
            }
            map.insert(blueprint.name.clone(), blueprint);
        }
        for blueprint in map.values() {
            if let Some(missing) = blueprint
                .requirements
                .iter()
                .find(|req| !map.contains_key(*req))
            {
                return Err(RegistryError::UnknownRequirement {
                    name: blueprint.name.clone(),
                    requirement: missing.clone(),
                });
            }
        }
        Ok(Self { blueprints: map })
    }

    /// The default table: a single `House` costing 30 wood.
    pub fn builtin() -> Self {
        let house = Blueprint {
            name: BLUEPRINT_HOUSE.to_string(),
            requirements: Vec::new(),
            cost: Quantities::from([(RESOURCE_WOOD.to_string(), 30)]),
            time: "1h".to_string(),
            build_duration: Duration::from_secs(3600),
        };
        Self {
            blueprints: HashMap::from([(house.name.clone(), house)]),
        }
    }

    /// Load a JSON array of `{name, cost, time, requirements}` entries.
    pub fn from_json_str(raw: &str) -> Result<Self, RegistryError> {
        let defs: Vec<BlueprintDef> = serde_json::from_str(raw)?;
        let blueprints = defs
            .into_iter()
            .map(|def| {
                Blueprint::new(def.name, def.cost, def.time)
                    .map(|bp| bp.with_requirements(def.requirements))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_blueprints(blueprints)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn get(&self, name: &str) -> Option<&Blueprint> {
        self.blueprints.get(name)
    }

    pub fn is_valid(&self, name: &str) -> bool {
        self.blueprints.contains_key(name)
    }

    /// Blueprint names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.blueprints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }
}
