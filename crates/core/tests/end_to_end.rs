//! End-to-end scenarios against the in-memory dummy appliance, exercising the
//! full stack from `Device::start_communication` down through the wire
//! encodings.

use chrono::NaiveDate;
use optolink_core::dummy::DummyDevice;
use optolink_core::{
    Address, Command, CoreError, CycleInterval, Device, Encoding, Parameter, ParameterStorage,
    ProtocolFamily, ProtocolRunner, Unit, Value,
};

fn storage_with(parameter: Parameter, address: Address, encoding: Encoding) -> ParameterStorage {
    let mut storage = ParameterStorage::new();
    storage.add(parameter, address, encoding).unwrap();
    storage
}

#[tokio::test]
async fn reads_an_unsigned_byte() {
    let device = DummyDevice::new();
    device.seed(0x0800, 0x2A);
    let storage = storage_with(
        Parameter::scalar("s", "Scalar", Unit::number(None, None, true), true),
        Address(0x0800),
        Encoding::uint(1),
    );
    let cache = Device::new("test", ProtocolFamily::Kw, storage).start_communication(device);

    let reading = cache.read_param("s", false, None).await.unwrap();
    assert_eq!(reading.value, Value::Number(42.0));
}

#[tokio::test]
async fn write_then_read_back_a_scaled_float_is_served_from_cache() {
    let device = DummyDevice::new();
    let storage = storage_with(
        Parameter::scalar("t_set", "Setpoint", Unit::number(None, None, false), false),
        Address(0x2544),
        Encoding::float(2, 10),
    );
    let cache = Device::new("test", ProtocolFamily::Kw, storage).start_communication(device);

    cache.set_param("t_set", Value::Number(21.5)).await.unwrap();
    let reading = cache.read_param("t_set", false, None).await.unwrap();
    assert_eq!(reading.value, Value::Number(21.5));
}

#[test]
fn cycle_timer_round_trip_and_rejection() {
    let well_formed = vec![
        CycleInterval::new((6, 0), (8, 30)),
        CycleInterval::new((17, 0), (22, 0)),
    ];
    let bytes = Encoding::Timer
        .serialize(&Value::Timer(well_formed.clone()))
        .unwrap();
    assert_eq!(bytes, vec![0x30, 0x43, 0x88, 0xB0, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(
        Encoding::Timer.deserialize(&bytes).unwrap(),
        Value::Timer(well_formed)
    );

    let misaligned = vec![CycleInterval::new((6, 5), (8, 0))];
    assert!(Unit::CycleTimer.validate(&Value::Timer(misaligned)).is_err());
}

#[test]
fn aggregated_child_addressing() {
    let storage = storage_with(
        Parameter::aggregated("prog", "Program", Unit::CycleTimer, 7, false),
        Address(0x2000),
        Encoding::array(Encoding::Timer, 7),
    );
    let (_, address, _) = storage.get("prog.3").unwrap();
    assert_eq!(address, Address(0x2018));
}

#[test]
fn system_time_bcd_round_trip() {
    let dt = NaiveDate::from_ymd_opt(2023, 9, 17)
        .unwrap()
        .and_hms_opt(14, 22, 3)
        .unwrap();
    let bytes = Encoding::SystemTime.serialize(&Value::SystemTime(dt)).unwrap();
    assert_eq!(bytes, vec![0x20, 0x23, 0x09, 0x17, 0x00, 0x14, 0x22, 0x03]);
    assert_eq!(Encoding::SystemTime.deserialize(&bytes).unwrap(), Value::SystemTime(dt));
}

#[tokio::test]
async fn resync_recovery_fails_only_the_broken_command() {
    let device = DummyDevice::new();
    device.force_resync_on_read(0x2000);
    device.seed(0x2100, 0x07);
    let runner = ProtocolRunner::start(device);
    let handle = runner.handle();

    let first = handle.submit(Command::read(Address(0x2000), 4)).await;
    assert!(matches!(first, Err(CoreError::ProtocolResync)));

    let second = handle.submit(Command::read(Address(0x2100), 1)).await.unwrap();
    assert_eq!(second, optolink_core::Answer::Data(vec![0x07]));
}

#[tokio::test]
async fn child_synthesis_and_parent_invalidation() {
    let device = DummyDevice::new();
    for i in 0u16..3 {
        device.seed(0x4000 + i, i as u8 + 10);
    }
    let storage = storage_with(
        Parameter::aggregated("bank", "Bank", Unit::number(None, None, true), 3, false),
        Address(0x4000),
        Encoding::array(Encoding::uint(1), 3),
    );
    let cache = Device::new("test", ProtocolFamily::Kw, storage).start_communication(device);

    cache.read_param("bank", false, None).await.unwrap();
    let child = cache.read_param("bank.1", false, None).await.unwrap();
    assert_eq!(child.value, Value::Number(11.0));

    cache.set_param("bank.1", Value::Number(99.0)).await.unwrap();
    let parent = cache.read_param("bank", false, None).await.unwrap();
    assert_eq!(
        parent.value,
        Value::Array(vec![Value::Number(10.0), Value::Number(99.0), Value::Number(12.0)])
    );
}
