//! Fuzz target for the device against its reference model
//!
//! Coverage-guided counterpart of the model-based proptest.
//!
//! # Strategy
//!
//! - Operation sequences: claims with valid and invalid names, lock calls
//!   from owners, delegates, lookalikes and anonymous callers, restarts
//!
//! # Invariants
//!
//! - Every result matches `ModelDevice`
//! - The owner pattern never changes once set
//! - The physical bolt matches the model after the run

#![no_main]

use std::sync::Arc;

use latch_core::{
    BlessingName, CallerCredential, Device, DeviceCall, DeviceReply, MemoryActuator,
    MemoryOwnerStore, NamedIdentity,
};
use latch_harness::{ModelDevice, Operation, OperationResult, SimEnv};
use libfuzzer_sys::fuzz_target;

fn build(
    store: &Arc<MemoryOwnerStore>,
    actuator: &Arc<MemoryActuator>,
) -> Device<SimEnv, Arc<MemoryActuator>> {
    let identity = NamedIdentity::new(BlessingName::parse("device").unwrap());
    Device::builder(SimEnv::new(), Arc::clone(actuator), Arc::new(identity))
        .store(Box::new(Arc::clone(store)))
        .build()
        .unwrap()
}

fn presented(caller: u8) -> CallerCredential {
    CallerCredential::from_presented(Operation::caller(caller).iter().copied())
}

fuzz_target!(|ops: Vec<Operation>| {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
    let store = Arc::new(MemoryOwnerStore::new());
    let actuator = Arc::new(MemoryActuator::new());
    let mut device = build(&store, &actuator);
    let mut model = ModelDevice::new();
    let mut owner = None;

    for op in ops.iter().take(256) {
        let expected = model.apply(op);

        let (caller, call) = match op {
            Operation::Restart => {
                device = build(&store, &actuator);
                assert_eq!(expected, OperationResult::Restarted);
                continue;
            },
            Operation::Describe => (CallerCredential::anonymous(), DeviceCall::Describe),
            Operation::Claim { name } => (
                CallerCredential::anonymous(),
                DeviceCall::Claim { name: Operation::name(*name).to_string() },
            ),
            Operation::Lock { caller } => (presented(*caller), DeviceCall::Lock),
            Operation::Unlock { caller } => (presented(*caller), DeviceCall::Unlock),
            Operation::Status { caller } => (presented(*caller), DeviceCall::Status),
        };

        let actual = match runtime.block_on(device.dispatch(&caller, call)) {
            Ok(DeviceReply::Claimed(issued)) => OperationResult::Claimed(issued.blessing.to_string()),
            Ok(DeviceReply::Done) => OperationResult::Done,
            Ok(DeviceReply::Status(status)) => OperationResult::Status(status),
            Ok(DeviceReply::Interface(methods)) => {
                OperationResult::Interface(methods.iter().map(|m| (*m).to_string()).collect())
            },
            Err(e) => OperationResult::Error(e.code()),
        };
        assert_eq!(expected, actual, "divergence on {op:?}");

        let current = device.owner().unwrap();
        if owner.is_some() {
            assert_eq!(current, owner, "owner changed");
        }
        owner = current;
    }

    assert_eq!(actuator.is_locked(), model.is_locked());
});
