//! EP2000 device profile.
//!
//! Holds the schemas for the three record kinds the EP2000 reports and the code
//! tables used to label its enumerated fields. Each code table is available both
//! as a Rust enum (with an `Unknown` arm for codes the firmware may add) and as
//! an [`EnumTable`] the decoder can use.

use crate::decoder::{EnumTable, FieldSpec, RecordKind, Schema, Transform, UNKNOWN_LABEL};
use std::fmt;

pub const MODEL: &str = "EP2000";

/// Payload the device answers with when probed with the SENSE command.
pub const SENSE_SIGNATURE: [u8; 14] = [
    0x00, 0x00, 0x00, 0xDC, 0x00, 0x69, 0x00, 0x8D, 0x00, 0x88, 0x00, 0x14, 0x00, 0x00,
];

/// Status fields shown in the condensed view.
pub static BASIC_STATUS_FIELDS: [&str; 9] = [
    "WorkState",
    "LoadPower",
    "LoadPercent",
    "BatteryVoltage",
    "BatteryCurrent",
    "BatteryCapacity",
    "TransformerTemp",
    "ChargeFlag",
    "MainSwitch",
];

/// Declares a code table: an enum with an `Unknown(u16)` fallback, its labels,
/// and a static [`EnumTable`] wrapping it.
macro_rules! code_table {
    ($(#[$meta:meta])* $name:ident, $table:ident { $($code:literal => $variant:ident : $label:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant,)+
            Unknown(u16),
        }

        impl $name {
            pub fn from_code(code: u16) -> Self {
                match code {
                    $($code => $name::$variant,)+
                    other => $name::Unknown(other),
                }
            }

            pub fn code(&self) -> u16 {
                match self {
                    $($name::$variant => $code,)+
                    $name::Unknown(other) => *other,
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Unknown(_) => UNKNOWN_LABEL,
                }
            }

            fn lookup(code: u16) -> Option<&'static str> {
                match Self::from_code(code) {
                    $name::Unknown(_) => None,
                    known => Some(known.label()),
                }
            }
        }

        impl From<u16> for $name {
            fn from(code: u16) -> Self {
                Self::from_code(code)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        pub static $table: EnumTable = EnumTable::new(stringify!($name), $name::lookup);
    };
}

code_table!(
    /// Operating state of the inverter.
    WorkState, WORK_STATE {
        1 => Init: "INIT",
        2 => SelfCheck: "SELF_CHECK",
        3 => Backup: "BACKUP",
        4 => Line: "LINE",
        5 => Stop: "STOP",
        6 => PowerOff: "POWER_OFF",
        7 => GridCharge: "GRID_CHG",
        8 => SoftStart: "SOFT_START",
    }
);

code_table!(
    LoadState, LOAD_STATE {
        0 => Normal: "LOAD_NORMAL",
        1 => Alarm: "LOAD_ALARM",
        2 => OverLoad: "OVER_LOAD",
    }
);

code_table!(
    /// Automatic voltage regulator stage.
    AvrState, AVR_STATE {
        0 => Bypass: "AVR_BYPASS",
        1 => StepDown: "AVR_STEPDWON",
        2 => Boost: "AVR_BOOST",
    }
);

code_table!(
    BuzzerState, BUZZER_STATE {
        0 => Off: "BUZZ_OFF",
        1 => Blew: "BUZZ_BLEW",
        2 => Alarm: "BUZZ_ALARM",
    }
);

code_table!(
    ChargeState, CHARGE_STATE {
        0 => ConstantCurrent: "CC",
        1 => ConstantVoltage: "CV",
        2 => FloatVoltage: "FV",
    }
);

code_table!(
    ChargeFlag, CHARGE_FLAG {
        0 => Uncharged: "UN_CHARGE",
        1 => Charged: "CHARGED",
    }
);

code_table!(
    MainSwitch, MAIN_SWITCH {
        0 => Off: "OFF",
        1 => On: "ON",
    }
);

code_table!(
    DelayType, DELAY_TYPE {
        0 => Standard: "STANDARD",
        1 => LongDelay: "LONG_DELAY",
    }
);

code_table!(
    /// Nominal grid frequency in Hz.
    GridFrequencyType, GRID_FREQUENCY_TYPE {
        0 => Hz50: "50",
        1 => Hz60: "60",
    }
);

code_table!(
    BuzzerSilence, BUZZER_SILENCE {
        0 => Normal: "NORMAL",
        1 => Silence: "SILENCE",
    }
);

code_table!(
    /// Switch where `1` enables the feature.
    Switch, SWITCH {
        0 => Disable: "DISABLE",
        1 => Enable: "ENABLE",
    }
);

code_table!(
    /// Switch where `0` enables the feature.
    InvertedSwitch, INVERTED_SWITCH {
        0 => Enable: "ENABLE",
        1 => Disable: "DISABLE",
    }
);

code_table!(
    /// Fault reported by the inverter, `0` means no fault.
    Fault, FAULT {
        0 => NoFault: "",
        1 => FanLockedOff: "Fan is locked when inverter is off",
        2 => TransformerOverTemperature: "Inverter transformer over temperature",
        3 => BatteryVoltageHigh: "battery voltage is too high",
        4 => BatteryVoltageLow: "battery voltage is too low",
        5 => OutputShortCircuit: "Output short circuited",
        6 => OutputVoltageHigh: "Inverter output voltage is high",
        7 => OverloadTimeout: "Overload time out",
        8 => BusVoltageHigh: "Inverter bus voltage is too high",
        9 => BusSoftStartFailed: "Bus soft start failed",
        11 => MainRelayFailed: "Main relay failed",
        21 => OutputVoltageSensor: "Inverter output voltage sensor error",
        22 => GridVoltageSensor: "Inverter grid voltage sensor error",
        23 => OutputCurrentSensor: "Inverter output current sensor error",
        24 => GridCurrentSensor: "Inverter grid current sensor error",
        25 => LoadCurrentSensor: "Inverter load current sensor error",
        26 => GridOverCurrent: "Inverter grid over current error",
        27 => RadiatorOverTemperature: "Inverter radiator over temperature",
        31 => SolarBatteryClass: "Solar charger battery voltage class error",
        32 => SolarCurrentSensor: "Solar charger current sensor error",
        33 => SolarCurrentUncontrollable: "Solar charger current is uncontrollable",
        41 => GridVoltageLow: "Inverter grid voltage is low",
        42 => GridVoltageHigh: "Inverter grid voltage is high",
        43 => GridUnderFrequency: "Inverter grid under frequency",
        44 => GridOverFrequency: "Inverter grid over frequency",
        51 => OverCurrentProtection: "Inverter over current protection error",
        52 => BusVoltageLow: "Inverter bus voltage is too low",
        53 => InverterSoftStartFailed: "Inverter soft start failed",
        54 => DcOffsetInOutput: "Over DC voltage in AC output",
        56 => BatteryOpen: "Battery connection is open",
        57 => ControlCurrentSensor: "Inverter control current sensor error",
        58 => OutputVoltageLow: "Inverter output voltage is too low",
        61 => FanLockedOn: "Fan is locked when inverter is on.",
        62 => Fan2LockedOn: "Fan2 is locked when inverter is on.",
        63 => BatteryOverCharged: "Battery is over-charged.",
        64 => LowBattery: "Low battery",
        67 => Overload: "Overload",
        70 => OutputPowerDerating: "Output power Derating",
        72 => SolarStopLowBattery: "Solar charger stops due to low battery",
        73 => SolarStopHighPv: "Solar charger stops due to high PV voltage",
        74 => SolarStopOverload: "Solar charger stops due to over load",
        75 => SolarOverTemperature: "Solar charger over temperature",
        76 => PvCommunication: "PV charger communication error",
        77 => ParameterError: "Parameter error",
    }
);

const ALARM_WIDTH: usize = 4;

static STATUS_FIELDS: [FieldSpec; 27] = [
    FieldSpec::new("MachineType", 0, Transform::Identity, ""),
    FieldSpec::new("SoftwareVersion", 1, Transform::Identity, ""),
    FieldSpec::new("WorkState", 2, Transform::Lookup(&WORK_STATE), ""),
    FieldSpec::new("BatClass", 3, Transform::Identity, "V"),
    FieldSpec::new("RatedPower", 4, Transform::Identity, "W"),
    FieldSpec::new("GridVoltage", 5, Transform::TENTHS, "V"),
    FieldSpec::new("GridFrequency", 6, Transform::TENTHS, "Hz"),
    FieldSpec::new("OutputVoltage", 7, Transform::TENTHS, "V"),
    FieldSpec::new("OutputFrequency", 8, Transform::TENTHS, "Hz"),
    FieldSpec::new("LoadCurrent", 9, Transform::TENTHS, "A"),
    FieldSpec::new("LoadPower", 10, Transform::Identity, "W"),
    FieldSpec::new("ApparentPower", 11, Transform::Identity, "VA"),
    FieldSpec::new("LoadPercent", 12, Transform::Identity, "%"),
    FieldSpec::new("LoadState", 13, Transform::Lookup(&LOAD_STATE), ""),
    FieldSpec::new("BatteryVoltage", 14, Transform::TENTHS, "V"),
    FieldSpec::new("BatteryCurrent", 15, Transform::TENTHS, "A"),
    FieldSpec::new("Undocumented:16", 16, Transform::Identity, ""),
    FieldSpec::new("BatteryCapacity", 17, Transform::Identity, "%"),
    FieldSpec::new("TransformerTemp", 18, Transform::Identity, "°C"),
    FieldSpec::new("AvrState", 19, Transform::Lookup(&AVR_STATE), ""),
    FieldSpec::new("BuzzerState", 20, Transform::Lookup(&BUZZER_STATE), ""),
    FieldSpec::new("Fault", 21, Transform::Lookup(&FAULT), ""),
    FieldSpec::new("Alarm", 22, Transform::BitString { width: ALARM_WIDTH }, ""),
    FieldSpec::new("ChargeState", 23, Transform::Lookup(&CHARGE_STATE), ""),
    FieldSpec::new("ChargeFlag", 24, Transform::Lookup(&CHARGE_FLAG), ""),
    FieldSpec::new("MainSwitch", 25, Transform::Lookup(&MAIN_SWITCH), ""),
    FieldSpec::new("DelayType", 26, Transform::Lookup(&DELAY_TYPE), ""),
];

static SETUP_FIELDS: [FieldSpec; 10] = [
    FieldSpec::new("GridFrequencyType", 0, Transform::Lookup(&GRID_FREQUENCY_TYPE), "Hz"),
    FieldSpec::new("GridVoltageType", 1, Transform::Identity, "V"),
    FieldSpec::new("BatteryLowVoltage", 2, Transform::TENTHS, "V"),
    FieldSpec::new("ConstantChargeVoltage", 3, Transform::TENTHS, "V"),
    FieldSpec::new("FloatChargeVoltage", 4, Transform::TENTHS, "V"),
    FieldSpec::new("BulkChargeCurrent", 5, Transform::Identity, "A"),
    FieldSpec::new("BuzzerSilence", 6, Transform::Lookup(&BUZZER_SILENCE), ""),
    FieldSpec::new("EnableGridCharge", 7, Transform::Lookup(&INVERTED_SWITCH), ""),
    FieldSpec::new("EnableKeySound", 8, Transform::Lookup(&INVERTED_SWITCH), ""),
    FieldSpec::new("EnableBacklight", 9, Transform::Lookup(&SWITCH), ""),
];

/// Telemetry record, 27 words.
pub static STATUS: Schema = Schema {
    kind: RecordKind::Status,
    words: 27,
    fields: &STATUS_FIELDS,
};

/// Configuration record, 10 words.
pub static SETUP: Schema = Schema {
    kind: RecordKind::Setup,
    words: 10,
    fields: &SETUP_FIELDS,
};

/// Word index of a setup field, used when changing a single setting.
pub fn setup_word_index(name: &str) -> Option<usize> {
    SETUP.field(name).map(|field| field.index)
}

/// Compares a SENSE payload with the known EP2000 signature.
pub fn matches_signature(payload: &[u8]) -> bool {
    payload == SENSE_SIGNATURE
}
