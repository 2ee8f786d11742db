//! Runs inventory and scheduler grains and exposes them over HTTP.
//!
//! `GrainHost` activates a grain the first time an id is used, feeds its mailbox
//! one envelope at a time, and terminates it on `deactivate`, on `shutdown`, or
//! when the grain reports it has nothing left to do. The `http` module maps the
//! gateway routes onto host clients.

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod http;
pub mod mailbox;

pub use client::{InventoryClient, SchedulerClient};
pub use config::HostConfig;
pub use error::HostError;
pub use host::{GrainHost, HostServices};
pub use mailbox::{Activation, Mailbox};
