//! Race tests for claiming and actuation on a multi-threaded runtime.

use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};

use latch_core::{
    BlessingName, CallerCredential, Device, DeviceCall, DeviceConfig, DeviceError, DeviceMode,
    DeviceReply, LockStatus, MemoryActuator, NamedIdentity,
};

#[derive(Clone)]
struct TestEnv;

impl latch_core::Environment for TestEnv {
    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0);
    }
}

fn device_with_latency(latency: Duration) -> Arc<Device<TestEnv, MemoryActuator>> {
    let identity = Arc::new(NamedIdentity::new(BlessingName::parse("device").unwrap()));
    let device = Device::builder(TestEnv, MemoryActuator::with_state(false, latency), identity)
        .config(DeviceConfig {
            actuation_timeout: Duration::from_secs(5),
            status_timeout: Duration::from_secs(1),
        })
        .build()
        .unwrap();
    Arc::new(device)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn racing_claims_have_exactly_one_winner() {
    for _round in 0..20 {
        let device = device_with_latency(Duration::ZERO);

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let device = Arc::clone(&device);
                tokio::spawn(async move {
                    let name = format!("user{i}");
                    let result = device
                        .dispatch(&CallerCredential::anonymous(), DeviceCall::Claim { name: name.clone() })
                        .await;
                    (name, result)
                })
            })
            .collect();

        let mut winners = Vec::new();
        for task in tasks {
            let (name, result) = task.await.unwrap();
            match result {
                Ok(DeviceReply::Claimed(issued)) => winners.push((name, issued)),
                // Losers either lost the write lock or were gated after the flip.
                Err(DeviceError::AlreadyClaimed | DeviceError::OperationUnavailable { .. }) => {},
                other => panic!("unexpected claim result: {other:?}"),
            }
        }

        assert_eq!(winners.len(), 1, "exactly one claimant must win");
        let (name, issued) = &winners[0];
        assert_eq!(issued.blessing.as_str(), format!("device/{name}"));
        assert_eq!(device.owner().unwrap(), Some(issued.pattern.clone()));
        assert_eq!(device.mode().unwrap(), DeviceMode::Claimed);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_lock_and_unlock_settle_on_a_serial_outcome() {
    let device = device_with_latency(Duration::from_millis(1));
    device.claim("alice").unwrap();

    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let device = Arc::clone(&device);
            tokio::spawn(async move {
                let caller = CallerCredential::from_presented([format!("device/alice/d{i}")]);
                if i % 2 == 0 { device.lock(&caller).await } else { device.unlock(&caller).await }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let actuator = device.locks().actuator();
    assert_eq!(actuator.max_in_flight(), 1, "actuations overlapped");
    assert_eq!(actuator.actuations(), 40);

    let alice = CallerCredential::from_presented(["device/alice"]);
    let status = device.status(&alice).await.unwrap();
    assert_eq!(status, LockStatus::from_locked(actuator.is_locked()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn status_during_actuation_reports_pre_or_post_value() {
    let device = device_with_latency(Duration::from_millis(20));
    device.claim("alice").unwrap();
    let alice = CallerCredential::from_presented(["device/alice"]);

    device.unlock(&alice).await.unwrap();

    let locker = {
        let device = Arc::clone(&device);
        let alice = alice.clone();
        tokio::spawn(async move { device.lock(&alice).await })
    };

    let mut seen = HashSet::new();
    for _ in 0..10 {
        seen.insert(device.status(&alice).await.unwrap());
        tokio::time::sleep(Duration::from_millis(3)).await;
    }
    locker.await.unwrap().unwrap();
    seen.insert(device.status(&alice).await.unwrap());

    assert!(seen.is_subset(&HashSet::from([LockStatus::Locked, LockStatus::Unlocked])));
    assert_eq!(device.status(&alice).await.unwrap(), LockStatus::Locked);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn claim_racing_gated_lock_never_bypasses_authorization() {
    for _round in 0..20 {
        let device = device_with_latency(Duration::ZERO);
        let mallory = CallerCredential::from_presented(["device/mallory"]);

        let claimer = {
            let device = Arc::clone(&device);
            tokio::spawn(async move { device.claim("alice") })
        };
        let intruder = {
            let device = Arc::clone(&device);
            tokio::spawn(async move { device.lock(&mallory).await })
        };

        claimer.await.unwrap().unwrap();
        let result = intruder.await.unwrap();
        assert!(matches!(
            result,
            Err(DeviceError::OperationUnavailable { .. } | DeviceError::NotAuthorized { .. })
        ));
        assert!(!device.locks().actuator().is_locked());
    }
}
