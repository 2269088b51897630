//! Typed measurement store with per-field dirty tracking.
//!
//! The session layer writes decoded measurements here, [`compute`] derives
//! the trip statistics, and the renderer drains dirty bits after emitting a
//! field. A field's dirty bit is set exactly when its value differs from
//! what was last rendered; every writer goes through the compare-and-mark
//! helpers to keep that invariant.
//!
//! [`compute`]: SignalModel::compute

use heapless::String;

/// Width of one experimental unit label.
pub const UNIT_WIDTH: usize = 8;

/// Number of measurement slots in one KWP group response.
pub const EXP_SLOTS: usize = 4;

/// Every renderable field. Closed set; the dirty mask is indexed by it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldId {
    // Instruments cluster (addr 0x17)
    VehicleSpeed,
    EngineRpm,
    OilPressureMin,
    TimeEcu,
    Odometer,
    FuelLevel,
    FuelSensorResistance,
    AmbientTemp,
    CoolantTemp,
    OilLevelOk,
    OilTemp,
    // Engine ECU (addr 0x01)
    TempUnknown1,
    Lambda,
    ErrorBits,
    Pressure,
    TbAngle,
    SteeringAngle,
    Voltage,
    TempUnknown2,
    TempUnknown3,
    EngineLoad,
    Lambda2,
    // Experimental group view
    ExpGroup,
    ExpSide,
    ExpValues,
    ExpUnits,
    // Derived trip statistics
    ElapsedSeconds,
    ElapsedKm,
    FuelBurned,
    FuelPer100km,
    FuelPerHour,
}

// The dirty mask is a u32; keep the enum inside it.
const _: () = assert!((FieldId::FuelPerHour as u32) < 32);

impl FieldId {
    #[inline]
    const fn mask(self) -> u32 {
        1 << (self as u32)
    }
}

/// A field value handed to the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value<'a> {
    Uint(u32),
    Int(i32),
    Float(f32),
    Text(&'a str),
}

/// Compare-and-store; marks the field dirty only when the value changed.
fn update_field<T: PartialEq + Copy>(dirty: &mut u32, slot: &mut T, value: T, field: FieldId) {
    if *slot != value {
        *slot = value;
        *dirty |= field.mask();
    }
}

// =============================================================================
// Signal groups
// =============================================================================

/// Instrument cluster measurements plus the session-start snapshots the
/// trip statistics are computed from.
#[derive(Default)]
pub struct InstrumentSignals {
    pub vehicle_speed: u16,
    pub engine_rpm: u16,
    pub oil_pressure_min: u16,
    pub time_ecu: u32,
    pub odometer: u32,
    pub odometer_start: u32,
    pub fuel_level: u8,
    pub fuel_level_start: u8,
    pub fuel_sensor_resistance: u16,
    pub ambient_temp: u8,
    pub coolant_temp: u8,
    pub oil_level_ok: u8,
    pub oil_temp: u8,
}

/// Engine ECU measurements and the eight error flags rendered as a fixed
/// 8-character string.
pub struct EngineSignals {
    pub temp_unknown1: u8,
    pub lambda: i8,
    pub exhaust_gas_recirculation_error: bool,
    pub oxygen_sensor_heating_error: bool,
    pub oxygen_sensor_error: bool,
    pub air_conditioning_error: bool,
    pub secondary_air_injection_error: bool,
    pub evaporative_emissions_error: bool,
    pub catalyst_heating_error: bool,
    pub catalytic_converter: bool,
    bits_text: String<8>,
    pub pressure: u16,
    pub tb_angle: f32,
    pub steering_angle: f32,
    pub voltage: f32,
    pub temp_unknown2: u8,
    pub temp_unknown3: u8,
    pub engine_load: u16,
    pub lambda2: i8,
}

impl Default for EngineSignals {
    fn default() -> Self {
        let mut bits_text = String::new();
        for _ in 0..8 {
            bits_text.push(' ').ok();
        }
        Self {
            temp_unknown1: 0,
            lambda: 0,
            exhaust_gas_recirculation_error: false,
            oxygen_sensor_heating_error: false,
            oxygen_sensor_error: false,
            air_conditioning_error: false,
            secondary_air_injection_error: false,
            evaporative_emissions_error: false,
            catalyst_heating_error: false,
            catalytic_converter: false,
            bits_text,
            pressure: 0,
            tb_angle: 0.0,
            steering_angle: 0.0,
            voltage: 0.0,
            temp_unknown2: 0,
            temp_unknown3: 0,
            engine_load: 0,
            lambda2: 0,
        }
    }
}

impl EngineSignals {
    /// The error flags as exactly eight '0'/'1' characters.
    pub fn bits_as_string(&self) -> &str {
        self.bits_text.as_str()
    }

    fn refresh_bits_text(&mut self) {
        let flags = [
            self.exhaust_gas_recirculation_error,
            self.oxygen_sensor_heating_error,
            self.oxygen_sensor_error,
            self.air_conditioning_error,
            self.secondary_air_injection_error,
            self.evaporative_emissions_error,
            self.catalyst_heating_error,
            self.catalytic_converter,
        ];
        self.bits_text.clear();
        for flag in flags {
            self.bits_text.push(if flag { '1' } else { '0' }).ok();
        }
    }
}

/// Raw decoded slots of the currently selected measurement group.
pub struct ExperimentalGroup {
    pub k: [u8; EXP_SLOTS],
    pub v: [f32; EXP_SLOTS],
    unit: [String<UNIT_WIDTH>; EXP_SLOTS],
    pub group_current: u8,
    /// false shows slots 0/1, true shows slots 2/3.
    pub side: bool,
}

impl ExperimentalGroup {
    fn with_units(text: &str) -> Self {
        Self {
            k: [0; EXP_SLOTS],
            v: [123.4; EXP_SLOTS],
            unit: core::array::from_fn(|_| {
                let mut s = String::new();
                s.push_str(text).ok();
                s
            }),
            group_current: 1,
            side: false,
        }
    }

    pub fn unit(&self, idx: usize) -> &str {
        self.unit[idx].as_str()
    }
}

impl Default for ExperimentalGroup {
    fn default() -> Self {
        Self::with_units("N/A")
    }
}

/// Trip statistics derived on every tick.
#[derive(Default)]
pub struct ComputedStats {
    pub elapsed_seconds: u32,
    pub elapsed_km: u16,
    pub fuel_burned: u8,
    pub fuel_per_100km: f32,
    pub fuel_per_hour: f32,
}

/// Walk directions of the simulation mode, one per walked field.
struct SimWalk {
    speed_up: bool,
    rpm_up: bool,
    coolant_up: bool,
    oil_temp_up: bool,
    oil_level_up: bool,
    fuel_up: bool,
}

impl Default for SimWalk {
    fn default() -> Self {
        Self {
            speed_up: true,
            rpm_up: true,
            coolant_up: true,
            oil_temp_up: true,
            oil_level_up: true,
            fuel_up: true,
        }
    }
}

// =============================================================================
// Signal model
// =============================================================================

/// The complete measurement state of one session.
#[derive(Default)]
pub struct SignalModel {
    pub instruments: InstrumentSignals,
    pub engine: EngineSignals,
    pub experimental: ExperimentalGroup,
    pub computed: ComputedStats,
    dirty: u32,
    sim: SimWalk,
}

impl SignalModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return every field to its default and clear all dirty bits.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn mark(&mut self, field: FieldId) {
        self.dirty |= field.mask();
    }

    #[inline]
    pub fn is_dirty(&self, field: FieldId) -> bool {
        self.dirty & field.mask() != 0
    }

    /// Read and clear one dirty bit. The renderer calls this right after
    /// emitting the field.
    pub fn drain(&mut self, field: FieldId) -> bool {
        let was = self.is_dirty(field);
        self.dirty &= !field.mask();
        was
    }

    /// True when any field is dirty. Test hook.
    pub fn any_dirty(&self) -> bool {
        self.dirty != 0
    }

    /// Write one decoded measurement into its routed field, converting to
    /// the field's storage type and marking it dirty on change.
    pub fn apply_routed(&mut self, field: FieldId, v: f32) {
        let d = &mut self.dirty;
        let i = &mut self.instruments;
        let e = &mut self.engine;
        match field {
            FieldId::VehicleSpeed => update_field(d, &mut i.vehicle_speed, v as u16, field),
            FieldId::EngineRpm => update_field(d, &mut i.engine_rpm, v as u16, field),
            FieldId::OilPressureMin => update_field(d, &mut i.oil_pressure_min, v as u16, field),
            FieldId::TimeEcu => update_field(d, &mut i.time_ecu, v as u32, field),
            FieldId::Odometer => {
                let value = v as u32;
                // Seed the trip start on the first reading of the session
                if i.odometer_start == 0 {
                    i.odometer_start = value;
                }
                update_field(d, &mut i.odometer, value, field);
            }
            FieldId::FuelLevel => {
                let value = v as u8;
                if i.fuel_level_start == 0 {
                    i.fuel_level_start = value;
                }
                update_field(d, &mut i.fuel_level, value, field);
            }
            FieldId::FuelSensorResistance => {
                update_field(d, &mut i.fuel_sensor_resistance, v as u16, field)
            }
            FieldId::AmbientTemp => update_field(d, &mut i.ambient_temp, v as u8, field),
            FieldId::CoolantTemp => update_field(d, &mut i.coolant_temp, v as u8, field),
            FieldId::OilLevelOk => update_field(d, &mut i.oil_level_ok, v as u8, field),
            FieldId::OilTemp => update_field(d, &mut i.oil_temp, v as u8, field),
            FieldId::TempUnknown1 => update_field(d, &mut e.temp_unknown1, v as u8, field),
            FieldId::Lambda => update_field(d, &mut e.lambda, v as i8, field),
            FieldId::Pressure => update_field(d, &mut e.pressure, v as u16, field),
            FieldId::TbAngle => update_field(d, &mut e.tb_angle, v, field),
            FieldId::SteeringAngle => update_field(d, &mut e.steering_angle, v, field),
            FieldId::Voltage => update_field(d, &mut e.voltage, v, field),
            FieldId::TempUnknown2 => update_field(d, &mut e.temp_unknown2, v as u8, field),
            FieldId::TempUnknown3 => update_field(d, &mut e.temp_unknown3, v as u8, field),
            FieldId::EngineLoad => update_field(d, &mut e.engine_load, v as u16, field),
            FieldId::Lambda2 => update_field(d, &mut e.lambda2, v as i8, field),
            // Error bits, experimental slots and computed stats have their
            // own writers; nothing routes to them.
            _ => {}
        }
    }

    /// Set one of the eight engine error flags (index 0..7).
    pub fn set_error_bit(&mut self, idx: usize, value: bool) {
        let e = &mut self.engine;
        let slot = match idx {
            0 => &mut e.exhaust_gas_recirculation_error,
            1 => &mut e.oxygen_sensor_heating_error,
            2 => &mut e.oxygen_sensor_error,
            3 => &mut e.air_conditioning_error,
            4 => &mut e.secondary_air_injection_error,
            5 => &mut e.evaporative_emissions_error,
            6 => &mut e.catalyst_heating_error,
            7 => &mut e.catalytic_converter,
            _ => return,
        };
        if *slot != value {
            *slot = value;
            self.engine.refresh_bits_text();
            self.dirty |= FieldId::ErrorBits.mask();
        }
    }

    /// Reset the experimental slots to the in-flight sentinel before a
    /// group read. Slots the response does not cover stay in this state.
    pub fn prepare_group_read(&mut self) {
        for idx in 0..EXP_SLOTS {
            self.experimental.k[idx] = 0;
            self.experimental.v[idx] = -1.0;
            self.experimental.unit[idx].clear();
            self.experimental.unit[idx].push_str("ERR").ok();
        }
    }

    /// Store one decoded `(k, value, unit)` tuple in an experimental slot.
    pub fn set_experimental_slot(&mut self, idx: usize, k: u8, v: f32, unit: &str) {
        if idx >= EXP_SLOTS {
            return;
        }
        let exp = &mut self.experimental;
        if exp.k[idx] != k {
            exp.k[idx] = k;
            self.dirty |= FieldId::ExpValues.mask();
        }
        if exp.v[idx] != v {
            exp.v[idx] = v;
            self.dirty |= FieldId::ExpValues.mask();
        }
        if exp.unit[idx].as_str() != unit {
            exp.unit[idx].clear();
            exp.unit[idx].push_str(unit).ok();
            self.dirty |= FieldId::ExpUnits.mask();
        }
    }

    /// Select the measurement group shown by the experimental view.
    pub fn set_experimental_group(&mut self, group: u8) {
        update_field(
            &mut self.dirty,
            &mut self.experimental.group_current,
            group,
            FieldId::ExpGroup,
        );
    }

    /// Flip which pair of slots the experimental view shows.
    pub fn invert_group_side(&mut self) {
        self.experimental.side = !self.experimental.side;
        self.dirty |= FieldId::ExpSide.mask();
    }

    /// Derive the trip statistics from the current raw signals.
    pub fn compute(&mut self, now_ms: u32, connect_start_ms: u32) {
        let d = &mut self.dirty;
        let i = &self.instruments;
        let c = &mut self.computed;

        let secs = now_ms.wrapping_sub(connect_start_ms) / 1000;
        update_field(d, &mut c.elapsed_seconds, secs, FieldId::ElapsedSeconds);

        let km = i.odometer.saturating_sub(i.odometer_start) as u16;
        update_field(d, &mut c.elapsed_km, km, FieldId::ElapsedKm);

        let burned = (i.fuel_level_start as i16 - i.fuel_level as i16).unsigned_abs() as u8;
        update_field(d, &mut c.fuel_burned, burned, FieldId::FuelBurned);

        let per_100 = if km > 0 {
            (100.0 / km as f32) * burned as f32
        } else {
            0.0
        };
        update_field(d, &mut c.fuel_per_100km, per_100, FieldId::FuelPer100km);

        let per_hour = if secs > 0 {
            (3600.0 / secs as f32) * burned as f32
        } else {
            0.0
        };
        update_field(d, &mut c.fuel_per_hour, per_hour, FieldId::FuelPerHour);
    }

    /// Advance the simulation walk: each simulated field steps by its delta
    /// and reverses direction at its bounds.
    pub fn update_simulation(&mut self) {
        fn walk_u16(
            dirty: &mut u32,
            slot: &mut u16,
            up: &mut bool,
            delta: u16,
            max: u16,
            field: FieldId,
        ) {
            let next = if *up {
                slot.saturating_add(delta)
            } else {
                slot.saturating_sub(delta)
            };
            update_field(dirty, slot, next, field);
            if *up && next >= max {
                *up = false;
            } else if !*up && next == 0 {
                *up = true;
            }
        }

        fn walk_u8(dirty: &mut u32, slot: &mut u8, up: &mut bool, max: u8, field: FieldId) {
            let next = if *up {
                slot.saturating_add(1)
            } else {
                slot.saturating_sub(1)
            };
            update_field(dirty, slot, next, field);
            if *up && next >= max {
                *up = false;
            } else if !*up && next == 0 {
                *up = true;
            }
        }

        let d = &mut self.dirty;
        let i = &mut self.instruments;
        let s = &mut self.sim;
        walk_u16(d, &mut i.vehicle_speed, &mut s.speed_up, 1, 200, FieldId::VehicleSpeed);
        walk_u16(d, &mut i.engine_rpm, &mut s.rpm_up, 87, 7100, FieldId::EngineRpm);
        walk_u8(d, &mut i.coolant_temp, &mut s.coolant_up, 160, FieldId::CoolantTemp);
        walk_u8(d, &mut i.oil_temp, &mut s.oil_temp_up, 160, FieldId::OilTemp);
        walk_u8(d, &mut i.oil_level_ok, &mut s.oil_level_up, 8, FieldId::OilLevelOk);
        walk_u8(d, &mut i.fuel_level, &mut s.fuel_up, 57, FieldId::FuelLevel);
    }

    /// Current value of a field as the renderer sees it.
    pub fn value(&self, field: FieldId) -> Value<'_> {
        let i = &self.instruments;
        let e = &self.engine;
        let c = &self.computed;
        match field {
            FieldId::VehicleSpeed => Value::Uint(i.vehicle_speed.into()),
            FieldId::EngineRpm => Value::Uint(i.engine_rpm.into()),
            FieldId::OilPressureMin => Value::Uint(i.oil_pressure_min.into()),
            FieldId::TimeEcu => Value::Uint(i.time_ecu),
            FieldId::Odometer => Value::Uint(i.odometer),
            FieldId::FuelLevel => Value::Uint(i.fuel_level.into()),
            FieldId::FuelSensorResistance => Value::Uint(i.fuel_sensor_resistance.into()),
            FieldId::AmbientTemp => Value::Uint(i.ambient_temp.into()),
            FieldId::CoolantTemp => Value::Uint(i.coolant_temp.into()),
            FieldId::OilLevelOk => Value::Uint(i.oil_level_ok.into()),
            FieldId::OilTemp => Value::Uint(i.oil_temp.into()),
            FieldId::TempUnknown1 => Value::Uint(e.temp_unknown1.into()),
            FieldId::Lambda => Value::Int(e.lambda.into()),
            FieldId::ErrorBits => Value::Text(e.bits_as_string()),
            FieldId::Pressure => Value::Uint(e.pressure.into()),
            FieldId::TbAngle => Value::Float(e.tb_angle),
            FieldId::SteeringAngle => Value::Float(e.steering_angle),
            FieldId::Voltage => Value::Float(e.voltage),
            FieldId::TempUnknown2 => Value::Uint(e.temp_unknown2.into()),
            FieldId::TempUnknown3 => Value::Uint(e.temp_unknown3.into()),
            FieldId::EngineLoad => Value::Uint(e.engine_load.into()),
            FieldId::Lambda2 => Value::Int(e.lambda2.into()),
            FieldId::ExpGroup => Value::Uint(self.experimental.group_current.into()),
            FieldId::ExpSide => Value::Uint(self.experimental.side as u32),
            // Slot arrays are rendered directly by the experimental view
            FieldId::ExpValues | FieldId::ExpUnits => Value::Uint(0),
            FieldId::ElapsedSeconds => Value::Uint(c.elapsed_seconds),
            FieldId::ElapsedKm => Value::Uint(c.elapsed_km.into()),
            FieldId::FuelBurned => Value::Uint(c.fuel_burned.into()),
            FieldId::FuelPer100km => Value::Float(c.fuel_per_100km),
            FieldId::FuelPerHour => Value::Float(c.fuel_per_hour),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let model = SignalModel::new();
        assert!(!model.any_dirty());
        assert_eq!(model.instruments.vehicle_speed, 0);
        assert_eq!(model.experimental.v[0], 123.4);
        assert_eq!(model.experimental.unit(0), "N/A");
        assert_eq!(model.engine.bits_as_string(), "        ");
        assert_eq!(model.experimental.group_current, 1);
    }

    #[test]
    fn test_apply_routed_marks_on_change_only() {
        let mut model = SignalModel::new();
        model.apply_routed(FieldId::VehicleSpeed, 88.0);
        assert_eq!(model.instruments.vehicle_speed, 88);
        assert!(model.is_dirty(FieldId::VehicleSpeed));

        assert!(model.drain(FieldId::VehicleSpeed));
        assert!(!model.is_dirty(FieldId::VehicleSpeed));

        // Same value again: stays clean
        model.apply_routed(FieldId::VehicleSpeed, 88.0);
        assert!(!model.is_dirty(FieldId::VehicleSpeed));
    }

    #[test]
    fn test_drain_reports_previous_state() {
        let mut model = SignalModel::new();
        assert!(!model.drain(FieldId::Voltage));
        model.apply_routed(FieldId::Voltage, 12.5);
        assert!(model.drain(FieldId::Voltage));
        assert!(!model.drain(FieldId::Voltage));
    }

    #[test]
    fn test_odometer_start_seeded_on_first_reading() {
        let mut model = SignalModel::new();
        model.apply_routed(FieldId::Odometer, 150_000.0);
        assert_eq!(model.instruments.odometer_start, 150_000);
        model.apply_routed(FieldId::Odometer, 150_012.0);
        assert_eq!(model.instruments.odometer_start, 150_000);
        assert_eq!(model.instruments.odometer, 150_012);
    }

    #[test]
    fn test_compute_elapsed_and_distance() {
        let mut model = SignalModel::new();
        model.instruments.odometer_start = 1000;
        model.instruments.odometer = 1050;
        model.compute(5000, 2000);
        assert_eq!(model.computed.elapsed_seconds, 3);
        assert_eq!(model.computed.elapsed_km, 50);
        assert!(model.is_dirty(FieldId::ElapsedSeconds));
        assert!(model.is_dirty(FieldId::ElapsedKm));
    }

    #[test]
    fn test_compute_zero_guards() {
        let mut model = SignalModel::new();
        model.instruments.fuel_level_start = 60;
        model.instruments.fuel_level = 55;
        // Zero km and zero seconds: both rates stay zero
        model.compute(0, 0);
        assert_eq!(model.computed.fuel_burned, 5);
        assert_eq!(model.computed.fuel_per_100km, 0.0);
        assert_eq!(model.computed.fuel_per_hour, 0.0);
    }

    #[test]
    fn test_compute_one_hour_trip() {
        // 1 h, 50 km, 5 l burned -> 10 l/100km, 5 l/h
        let mut model = SignalModel::new();
        model.instruments.odometer_start = 1000;
        model.instruments.odometer = 1050;
        model.instruments.fuel_level_start = 60;
        model.instruments.fuel_level = 55;
        model.compute(3_600_000, 0);
        assert_eq!(model.computed.elapsed_seconds, 3600);
        assert_eq!(model.computed.elapsed_km, 50);
        assert_eq!(model.computed.fuel_burned, 5);
        assert_eq!(model.computed.fuel_per_100km, 10.0);
        assert_eq!(model.computed.fuel_per_hour, 5.0);
    }

    #[test]
    fn test_compute_marks_only_changes() {
        let mut model = SignalModel::new();
        model.compute(10_000, 0);
        while model.any_dirty() {
            for field in [
                FieldId::ElapsedSeconds,
                FieldId::ElapsedKm,
                FieldId::FuelBurned,
                FieldId::FuelPer100km,
                FieldId::FuelPerHour,
            ] {
                model.drain(field);
            }
        }
        // Same inputs: nothing changes, nothing marked
        model.compute(10_900, 0);
        assert!(!model.any_dirty());
    }

    #[test]
    fn test_error_bits_string() {
        let mut model = SignalModel::new();
        model.set_error_bit(0, true);
        model.set_error_bit(7, true);
        assert_eq!(model.engine.bits_as_string(), "10000001");
        assert_eq!(model.engine.bits_as_string().len(), 8);
        assert!(model.is_dirty(FieldId::ErrorBits));
    }

    #[test]
    fn test_experimental_slot_updates() {
        let mut model = SignalModel::new();
        model.prepare_group_read();
        assert_eq!(model.experimental.unit(2), "ERR");
        assert_eq!(model.experimental.v[2], -1.0);

        model.set_experimental_slot(2, 7, 35.5, "km/h");
        assert_eq!(model.experimental.k[2], 7);
        assert_eq!(model.experimental.v[2], 35.5);
        assert_eq!(model.experimental.unit(2), "km/h");
        assert!(model.is_dirty(FieldId::ExpValues));
        assert!(model.is_dirty(FieldId::ExpUnits));
    }

    #[test]
    fn test_invert_group_side() {
        let mut model = SignalModel::new();
        assert!(!model.experimental.side);
        model.invert_group_side();
        assert!(model.experimental.side);
        assert!(model.drain(FieldId::ExpSide));
        model.invert_group_side();
        assert!(!model.experimental.side);
    }

    #[test]
    fn test_simulation_walk_respects_bounds() {
        let mut model = SignalModel::new();
        // Walk long enough to cross every bound several times
        for _ in 0..40_000 {
            model.update_simulation();
            let i = &model.instruments;
            assert!(i.vehicle_speed <= 200);
            assert!(i.engine_rpm <= 7187); // 7100 crossed by one 87 step
            assert!(i.coolant_temp <= 160);
            assert!(i.oil_temp <= 160);
            assert!(i.oil_level_ok <= 8);
            assert!(i.fuel_level <= 57);
        }
    }

    #[test]
    fn test_simulation_walk_reverses() {
        let mut model = SignalModel::new();
        let mut seen_down = false;
        let mut prev = 0u16;
        for _ in 0..500 {
            model.update_simulation();
            if model.instruments.vehicle_speed < prev {
                seen_down = true;
            }
            prev = model.instruments.vehicle_speed;
        }
        assert!(seen_down, "walk never reversed at the upper bound");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut model = SignalModel::new();
        model.apply_routed(FieldId::EngineRpm, 3000.0);
        model.set_error_bit(1, true);
        model.reset();
        assert!(!model.any_dirty());
        assert_eq!(model.instruments.engine_rpm, 0);
        assert_eq!(model.engine.bits_as_string(), "        ");
    }
}
