//! Request payloads and the response envelope every grain call returns.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KEY_ERROR: &str = "error";
pub const KEY_TIMER_ID: &str = "timer_id";
pub const KEY_GRAIN_ID: &str = "grain_id";
pub const KEY_BLUEPRINT: &str = "blueprint";
pub const KEY_POPULATION: &str = "population";
pub const KEY_RESOURCES: &str = "resources";
pub const KEY_BUILDINGS: &str = "buildings";

/// Free-form key/value document carried by requests and responses.
pub type Context = serde_json::Map<String, Value>;

pub fn now_wallclock_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "Error")]
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrainResponse {
    pub status: Status,
    pub timestamp_ns: u64,
    #[serde(default)]
    pub context: Context,
}

impl GrainResponse {
    pub fn ok(context: Context) -> Self {
        Self {
            status: Status::Ok,
            timestamp_ns: now_wallclock_ns(),
            context,
        }
    }

    pub fn empty_ok() -> Self {
        Self::ok(Context::new())
    }

    /// Error response whose context holds a single `error` field.
    pub fn error(message: impl fmt::Display) -> Self {
        let mut context = Context::new();
        context.insert(KEY_ERROR.into(), Value::String(message.to_string()));
        Self {
            status: Status::Error,
            timestamp_ns: now_wallclock_ns(),
            context,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn error_message(&self) -> Option<&str> {
        self.context.get(KEY_ERROR).and_then(Value::as_str)
    }
}

/// `StartBuild` payload. `blueprint` is `None` when the caller left it out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    #[serde(default)]
    pub blueprint: Option<String>,
}

impl BuildRequest {
    pub fn new(blueprint: impl Into<String>) -> Self {
        Self {
            blueprint: Some(blueprint.into()),
        }
    }
}

/// `Schedule` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// Countdown length, e.g. `"100ms"`.
    pub duration: String,
    /// Opaque reply target the expiry notification is addressed to.
    #[serde(default)]
    pub reply: String,
    #[serde(default)]
    pub payload: Context,
}
