//! Measurement decoding.
//!
//! A group response payload is a stream of 3-byte tuples `(k, a, b)`. `k`
//! selects the formula mapping `(a, b)` to a value and a unit; the routing
//! table then maps `(address, group, slot)` to the named field the value
//! belongs to, if any.

use crate::config::{ADDR_ENGINE, ADDR_INSTRUMENTS};
use crate::signals::FieldId;

/// One decoded measurement tuple.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decoded {
    pub value: f32,
    pub unit: &'static str,
}

/// Apply the formula selected by `k`. Unknown formulas return `None`; the
/// caller still records the raw tuple for the experimental view.
pub fn decode_measurement(k: u8, a: u8, b: u8) -> Option<Decoded> {
    let (a_f, b_f) = (a as f32, b as f32);
    let decoded = match k {
        1 => Decoded { value: 0.2 * a_f * b_f, unit: "rpm" },
        2 => Decoded { value: 0.002 * a_f * b_f, unit: "%" },
        3 => Decoded { value: 0.002 * a_f * b_f, unit: "Deg" },
        4 => Decoded {
            value: (b as i16 - 127).unsigned_abs() as f32 * 0.01 * a_f,
            unit: "ATDC",
        },
        5 => Decoded { value: a_f * (b_f - 100.0) * 0.1, unit: "C" },
        6 => Decoded { value: 0.001 * a_f * b_f, unit: "V" },
        7 => Decoded { value: 0.01 * a_f * b_f, unit: "km/h" },
        8 => Decoded { value: 0.1 * a_f * b_f, unit: " " },
        14 => Decoded { value: 0.005 * a_f * b_f, unit: "bar" },
        18 => Decoded { value: 0.04 * a_f * b_f, unit: "mbar" },
        19 => Decoded { value: 0.01 * a_f * b_f, unit: "l" },
        36 => Decoded {
            value: 2560.0 * a_f + 10.0 * b_f,
            unit: "km",
        },
        _ => return None,
    };
    Some(decoded)
}

/// Which named field a `(address, group, slot)` triple feeds.
const ROUTES: &[(u8, u8, u8, FieldId)] = &[
    // Instrument cluster
    (ADDR_INSTRUMENTS, 1, 0, FieldId::VehicleSpeed),
    (ADDR_INSTRUMENTS, 1, 1, FieldId::EngineRpm),
    (ADDR_INSTRUMENTS, 1, 2, FieldId::OilPressureMin),
    (ADDR_INSTRUMENTS, 1, 3, FieldId::TimeEcu),
    (ADDR_INSTRUMENTS, 2, 0, FieldId::Odometer),
    (ADDR_INSTRUMENTS, 2, 1, FieldId::FuelLevel),
    (ADDR_INSTRUMENTS, 2, 2, FieldId::FuelSensorResistance),
    (ADDR_INSTRUMENTS, 2, 3, FieldId::AmbientTemp),
    (ADDR_INSTRUMENTS, 3, 0, FieldId::CoolantTemp),
    (ADDR_INSTRUMENTS, 3, 1, FieldId::OilLevelOk),
    (ADDR_INSTRUMENTS, 3, 2, FieldId::OilTemp),
    // Engine ECU
    (ADDR_ENGINE, 1, 0, FieldId::EngineRpm),
    (ADDR_ENGINE, 1, 1, FieldId::TempUnknown1),
    (ADDR_ENGINE, 1, 2, FieldId::Lambda),
    (ADDR_ENGINE, 3, 1, FieldId::Pressure),
    (ADDR_ENGINE, 3, 2, FieldId::TbAngle),
    (ADDR_ENGINE, 3, 3, FieldId::SteeringAngle),
    (ADDR_ENGINE, 4, 1, FieldId::Voltage),
    (ADDR_ENGINE, 4, 2, FieldId::TempUnknown2),
    (ADDR_ENGINE, 4, 3, FieldId::TempUnknown3),
    (ADDR_ENGINE, 6, 1, FieldId::EngineLoad),
    (ADDR_ENGINE, 6, 3, FieldId::Lambda2),
];

/// Look up the named field for a decoded slot, if one exists.
pub fn route(addr: u8, group: u8, slot: u8) -> Option<FieldId> {
    ROUTES
        .iter()
        .find(|(a, g, s, _)| *a == addr && *g == group && *s == slot)
        .map(|(_, _, _, field)| *field)
}
