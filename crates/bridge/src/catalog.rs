//! A small, built-in parameter catalog so the bridge is runnable standalone
//! against the dummy device. Not a replacement for the source's YAML
//! parameter-catalog loader (explicitly out of scope, see SPEC_FULL.md §4.H) —
//! just enough real-looking parameters to exercise every encoding shape.

use optolink_core::{Address, Device, Encoding, Parameter, ParameterStorage, ProtocolFamily, Unit};

/// Builds the demo device: a handful of representative scalar and aggregated
/// parameters drawn from the kinds of values a KW appliance exposes.
pub fn demo_device() -> Device {
    let mut storage = ParameterStorage::new();

    storage
        .add(
            Parameter::scalar(
                "outside_temp",
                "Outside temperature",
                Unit::number(Some(-40.0), Some(60.0), false),
                true,
            ),
            Address(0x0800),
            Encoding::float(2, 10),
        )
        .expect("builtin catalog ids are unique");

    storage
        .add(
            Parameter::scalar(
                "boiler_temp_setpoint",
                "Boiler temperature setpoint",
                Unit::number(Some(10.0), Some(90.0), false),
                false,
            ),
            Address(0x2544),
            Encoding::float(2, 10),
        )
        .expect("builtin catalog ids are unique");

    storage
        .add(
            Parameter::scalar(
                "operating_status",
                "Burner operating status",
                Unit::OperatingStatus,
                true,
            ),
            Address(0x2510),
            Encoding::OperatingStatus,
        )
        .expect("builtin catalog ids are unique");

    storage
        .add(
            Parameter::scalar(
                "system_time",
                "Controller system time",
                Unit::SystemTime,
                false,
            ),
            Address(0x088E),
            Encoding::SystemTime,
        )
        .expect("builtin catalog ids are unique");

    storage
        .add(
            Parameter::aggregated(
                "heating_program",
                "Heating circuit 1 switching times",
                Unit::CycleTimer,
                7,
                false,
            ),
            Address(0x2100),
            Encoding::array(Encoding::Timer, 7),
        )
        .expect("builtin catalog ids are unique");

    storage
        .add(
            Parameter::scalar(
                "burner_hours",
                "Burner operating hours",
                Unit::Hours,
                true,
            ),
            Address(0x0886),
            Encoding::uint(4),
        )
        .expect("builtin catalog ids are unique");

    Device::new("demo-kw-boiler", ProtocolFamily::Kw, storage)
}
