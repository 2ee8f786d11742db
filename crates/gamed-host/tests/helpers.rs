#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use gamed_grains::{ChannelSink, Notification};
use gamed_host::{GrainHost, HostServices};
use gamed_store::MemStore;
use tokio::sync::mpsc::UnboundedReceiver;

pub struct TestHost {
    pub host: Arc<GrainHost>,
    pub store: Arc<MemStore>,
    pub notifications: UnboundedReceiver<Notification>,
}

/// Host over a fresh in-memory store whose expiry notifications land in
/// `notifications`.
pub fn test_host() -> TestHost {
    test_host_with_store(Arc::new(MemStore::new()))
}

pub fn test_host_with_store(store: Arc<MemStore>) -> TestHost {
    let (sink, notifications) = ChannelSink::new();
    let services = HostServices {
        store: store.clone(),
        ..HostServices::in_memory()
    }
    .with_sink(Arc::new(sink));
    let host = GrainHost::new(services).with_request_timeout(Duration::from_secs(2));
    TestHost {
        host: Arc::new(host),
        store,
        notifications,
    }
}
