//! Typed handles for calling activated grains.

use std::time::Duration;

use gamed_grains::{InventoryMsg, SchedulerMsg};
use gamed_types::{BuildRequest, GrainAddress, GrainResponse, ScheduleRequest};

use crate::error::HostError;
use crate::mailbox::Mailbox;

#[derive(Debug, Clone)]
pub struct InventoryClient {
    mailbox: Mailbox<InventoryMsg>,
    timeout: Duration,
}

impl InventoryClient {
    pub(crate) fn new(mailbox: Mailbox<InventoryMsg>, timeout: Duration) -> Self {
        Self { mailbox, timeout }
    }

    pub fn address(&self) -> GrainAddress {
        self.mailbox.address()
    }

    pub async fn start_build(&self, request: BuildRequest) -> Result<GrainResponse, HostError> {
        self.mailbox
            .call(|resp| InventoryMsg::StartBuild { request, resp }, self.timeout)
            .await
    }

    pub async fn describe(&self) -> Result<GrainResponse, HostError> {
        self.mailbox
            .call(|resp| InventoryMsg::Describe { resp }, self.timeout)
            .await
    }

    /// Deliver a message kind the inventory does not handle. It is logged and
    /// otherwise ignored.
    pub async fn send_unhandled(&self, kind: &str) -> Result<(), HostError> {
        self.mailbox.unhandled(kind).await
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerClient {
    mailbox: Mailbox<SchedulerMsg>,
    timeout: Duration,
}

impl SchedulerClient {
    pub(crate) fn new(mailbox: Mailbox<SchedulerMsg>, timeout: Duration) -> Self {
        Self { mailbox, timeout }
    }

    pub fn address(&self) -> GrainAddress {
        self.mailbox.address()
    }

    pub async fn schedule(&self, request: ScheduleRequest) -> Result<GrainResponse, HostError> {
        self.mailbox
            .call(|resp| SchedulerMsg::Schedule { request, resp }, self.timeout)
            .await
    }

    pub async fn send_unhandled(&self, kind: &str) -> Result<(), HostError> {
        self.mailbox.unhandled(kind).await
    }
}
