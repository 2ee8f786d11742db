#[path = "helpers.rs"]
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use gamed_host::{GrainHost, HostConfig, HostError, HostServices};
use gamed_types::{
    BLUEPRINT_HOUSE, BuildRequest, GrainAddress, KEY_BUILDINGS, KEY_RESOURCES, KEY_TIMER_ID,
    ScheduleRequest, inventory_grain_id, new_scheduler_grain_id,
};
use helpers::{test_host, test_host_with_store};
use serde_json::{Value, json};
use tokio::time::timeout;
use uuid::Uuid;

fn schedule(duration: &str, reply: &str) -> ScheduleRequest {
    ScheduleRequest {
        duration: duration.into(),
        reply: reply.into(),
        payload: json!({"kind": "build-finished"})
            .as_object()
            .cloned()
            .unwrap_or_default(),
    }
}

#[tokio::test]
async fn inventory_is_activated_once_per_user() {
    let t = test_host();
    let user = Uuid::new_v4();

    let a = t.host.inventory(user).await.unwrap();
    let b = t.host.inventory(user).await.unwrap();
    assert_eq!(a.address(), b.address());
    assert_eq!(a.address(), GrainAddress::inventory(inventory_grain_id(user)));
    assert_eq!(t.host.active_count().await, 1);

    a.start_build(BuildRequest::new(BLUEPRINT_HOUSE)).await.unwrap();
    let described = b.describe().await.unwrap();
    assert_eq!(described.context[KEY_RESOURCES], json!({"wood": 70}));
    assert_eq!(described.context[KEY_BUILDINGS], json!({"House": 1}));

    t.host.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrent_builds_never_overspend() {
    let t = test_host();
    let user = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let host = Arc::clone(&t.host);
        handles.push(tokio::spawn(async move {
            let client = host.inventory(user).await.unwrap();
            client
                .start_build(BuildRequest::new(BLUEPRINT_HOUSE))
                .await
                .unwrap()
        }));
    }
    let mut granted = 0;
    let mut rejected = 0;
    for handle in handles {
        let resp = handle.await.unwrap();
        if resp.is_ok() {
            granted += 1;
        } else {
            assert_eq!(resp.error_message(), Some("not enough wood"));
            rejected += 1;
        }
    }
    assert_eq!(granted, 3);
    assert_eq!(rejected, 5);

    let described = t.host.inventory(user).await.unwrap().describe().await.unwrap();
    assert_eq!(described.context[KEY_RESOURCES], json!({"wood": 10}));
    t.host.shutdown().await.unwrap();
}

#[tokio::test]
async fn deactivate_persists_and_reactivation_restores() {
    let t = test_host();
    let user = Uuid::new_v4();
    let client = t.host.inventory(user).await.unwrap();
    client
        .start_build(BuildRequest::new(BLUEPRINT_HOUSE))
        .await
        .unwrap();

    assert!(t.host.deactivate(client.address()).await.unwrap());
    assert!(!t.host.deactivate(client.address()).await.unwrap());
    assert_eq!(t.host.active_count().await, 0);
    assert!(t.store.contains(&client.address()));

    // The old handle points at a finished loop.
    let err = client.describe().await.unwrap_err();
    assert!(matches!(err, HostError::GrainUnavailable(_)));

    let revived = t.host.inventory(user).await.unwrap();
    let described = revived.describe().await.unwrap();
    assert_eq!(described.context[KEY_RESOURCES], json!({"wood": 70}));
    t.host.shutdown().await.unwrap();
}

#[tokio::test]
async fn unhandled_messages_are_ignored() {
    let t = test_host();
    let client = t.host.inventory(Uuid::new_v4()).await.unwrap();
    client.send_unhandled("Trade").await.unwrap();
    assert!(client.describe().await.unwrap().is_ok());
    t.host.shutdown().await.unwrap();
}

#[tokio::test]
async fn scheduled_timer_notifies_reply_target() {
    let mut t = test_host();
    let scheduler = t.host.scheduler(new_scheduler_grain_id()).await.unwrap();

    let resp = scheduler.schedule(schedule("50ms", "player-1")).await.unwrap();
    assert!(resp.is_ok());
    let timer_id = resp.context[KEY_TIMER_ID].as_str().unwrap().to_string();

    let got = timeout(Duration::from_secs(2), t.notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got.timer_id.to_string(), timer_id);
    assert_eq!(got.reply_target, "player-1");
    assert_eq!(
        Value::Object(got.payload),
        json!({"kind": "build-finished"})
    );
    t.host.shutdown().await.unwrap();
}

#[tokio::test]
async fn schedule_errors_come_back_in_the_envelope() {
    let t = test_host();
    let scheduler = t.host.scheduler(new_scheduler_grain_id()).await.unwrap();

    let resp = scheduler.schedule(schedule("soon", "x")).await.unwrap();
    assert!(!resp.is_ok());
    assert!(
        resp.error_message()
            .unwrap()
            .starts_with("failed to parse duration:")
    );

    let resp = scheduler.schedule(schedule("1s", "")).await.unwrap();
    assert_eq!(resp.error_message(), Some("reply topic shouldn't be empty"));
    t.host.shutdown().await.unwrap();
}

#[tokio::test]
async fn pending_timers_survive_a_restart() {
    let first = test_host();
    let grain_id = new_scheduler_grain_id();
    let scheduler = first.host.scheduler(grain_id).await.unwrap();
    let resp = scheduler.schedule(schedule("100ms", "later")).await.unwrap();
    let timer_id = resp.context[KEY_TIMER_ID].as_str().unwrap().to_string();
    first.host.shutdown().await.unwrap();

    let mut second = test_host_with_store(Arc::clone(&first.store));
    second.host.scheduler(grain_id).await.unwrap();
    let got = timeout(Duration::from_secs(2), second.notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got.timer_id.to_string(), timer_id);
    assert_eq!(got.reply_target, "later");
    second.host.shutdown().await.unwrap();
}

#[tokio::test]
async fn idle_scheduler_deactivates_and_can_be_addressed_again() {
    let mut t = test_host();
    let grain_id = new_scheduler_grain_id();
    let scheduler = t.host.scheduler(grain_id).await.unwrap();
    assert!(scheduler.schedule(schedule("10ms", "first")).await.unwrap().is_ok());
    let got = timeout(Duration::from_secs(2), t.notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got.reply_target, "first");

    let released = timeout(Duration::from_secs(2), async {
        while t.host.active_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(released.is_ok());

    let scheduler = t.host.scheduler(grain_id).await.unwrap();
    assert_eq!(t.host.active_count().await, 1);
    assert!(scheduler.schedule(schedule("10ms", "second")).await.unwrap().is_ok());
    let got = timeout(Duration::from_secs(2), t.notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got.reply_target, "second");
    assert!(
        timeout(Duration::from_millis(100), t.notifications.recv())
            .await
            .is_err()
    );
    t.host.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_refuses_new_activations() {
    let t = test_host();
    t.host.inventory(Uuid::new_v4()).await.unwrap();
    t.host.shutdown().await.unwrap();
    t.host.shutdown().await.unwrap();

    let err = t.host.inventory(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, HostError::ShuttingDown));
}

#[tokio::test]
async fn filesystem_store_keeps_inventory_across_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let config = HostConfig {
        store_dir: Some(dir.path().to_path_buf()),
        ..HostConfig::default()
    };
    let user = Uuid::new_v4();

    let host = GrainHost::from_config(&config).unwrap();
    let client = host.inventory(user).await.unwrap();
    client
        .start_build(BuildRequest::new(BLUEPRINT_HOUSE))
        .await
        .unwrap();
    host.shutdown().await.unwrap();

    let host = GrainHost::from_config(&config).unwrap();
    let described = host.inventory(user).await.unwrap().describe().await.unwrap();
    assert_eq!(described.context[KEY_BUILDINGS], json!({"House": 1}));
    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_blueprint_file_fails_startup() {
    let config = HostConfig {
        blueprints: Some("/nonexistent/blueprints.json".into()),
        ..HostConfig::default()
    };
    let err = HostServices::from_config(&config).err().unwrap();
    assert!(matches!(err, HostError::Registry(_)));
}
