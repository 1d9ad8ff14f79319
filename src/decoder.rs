//! Declarative field decoding.
//!
//! A [`Schema`] describes how the 16-bit words of a payload map onto named
//! fields. [`decode`] applies a schema to a payload and produces a [`Record`],
//! keeping the raw word next to the interpreted value so that a record can be
//! printed, logged or written back to the device.

use crate::protocol::{Error, Result, to_hex_string};
use std::borrow::Cow;
use std::fmt;

/// Label used for any code missing from an [`EnumTable`].
pub const UNKNOWN_LABEL: &str = "N/A";

/// Maps raw codes to display labels.
#[derive(Clone, Copy)]
pub struct EnumTable {
    pub name: &'static str,
    lookup: fn(u16) -> Option<&'static str>,
}

impl EnumTable {
    pub const fn new(name: &'static str, lookup: fn(u16) -> Option<&'static str>) -> Self {
        Self { name, lookup }
    }

    /// Returns the label for `code`, or [`UNKNOWN_LABEL`] if the code is not mapped.
    pub fn label(&self, code: u16) -> &'static str {
        (self.lookup)(code).unwrap_or(UNKNOWN_LABEL)
    }

    pub fn contains(&self, code: u16) -> bool {
        (self.lookup)(code).is_some()
    }
}

impl fmt::Debug for EnumTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EnumTable").field(&self.name).finish()
    }
}

impl PartialEq for EnumTable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Conversion from a raw word to its interpreted value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Identity,
    /// `round(raw * factor, decimals)`
    Scale { factor: f64, decimals: u8 },
    Lookup(&'static EnumTable),
    /// Raw value in binary, zero padded to `width` digits.
    BitString { width: usize },
}

impl Transform {
    /// The usual 0.1 scale used for voltages, currents and frequencies.
    pub const TENTHS: Transform = Transform::Scale {
        factor: 0.1,
        decimals: 1,
    };

    pub fn apply(&self, raw: u16) -> Value {
        match *self {
            Transform::Identity => Value::Number(raw),
            Transform::Scale { factor, decimals } => {
                let precision = 10f64.powi(decimals as i32);
                Value::Scaled {
                    value: (raw as f64 * factor * precision).round() / precision,
                    decimals,
                }
            }
            Transform::Lookup(table) => Value::Label(table.label(raw)),
            Transform::BitString { width } => Value::Text(format!("{raw:0width$b}")),
        }
    }
}

/// An interpreted field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(u16),
    Scaled { value: f64, decimals: u8 },
    Label(&'static str),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(number) => write!(f, "{number}"),
            Value::Scaled { value, decimals } => write!(f, "{:.*}", *decimals as usize, value),
            Value::Label(label) => f.write_str(label),
            Value::Text(text) => f.write_str(text),
        }
    }
}

/// Describes one field of a schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub index: usize,
    pub transform: Transform,
    pub unit: &'static str,
}

impl FieldSpec {
    pub const fn new(
        name: &'static str,
        index: usize,
        transform: Transform,
        unit: &'static str,
    ) -> Self {
        Self {
            name,
            index,
            transform,
            unit,
        }
    }
}

/// The record kinds the inverter reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Sense,
    Status,
    Setup,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Sense => "sense",
            RecordKind::Status => "status",
            RecordKind::Setup => "setup",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered field specification for one record kind.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub kind: RecordKind,
    /// Minimum number of words a payload must contain.
    pub words: usize,
    pub fields: &'static [FieldSpec],
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// One decoded field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Cow<'static, str>,
    pub index: usize,
    pub raw: u16,
    pub value: Value,
    pub unit: &'static str,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.index, self.raw, self.value, self.unit)
    }
}

/// Diagnostics kept alongside every decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub hex: String,
    pub words: Vec<u16>,
    pub model: &'static str,
}

impl Meta {
    pub fn new(payload: &[u8], model: &'static str) -> Self {
        Self {
            hex: to_hex_string(payload),
            words: payload
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect(),
            model,
        }
    }
}

/// Result of applying a [`Schema`] to a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: RecordKind,
    pub fields: Vec<Field>,
    pub meta: Meta,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Raw payload words in index order.
    pub fn words(&self) -> &[u16] {
        &self.meta.words
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Decodes `payload` according to `schema`.
///
/// Words past the schema are reported as `Undocumented:<index>` so that
/// firmware adding registers does not break decoding.
pub fn decode(payload: &[u8], schema: &Schema, model: &'static str) -> Result<Record> {
    let required = schema.words * 2;
    if payload.len() % 2 != 0 || payload.len() < required {
        return Err(Error::MalformedPayload {
            length: payload.len(),
            required,
        });
    }
    let meta = Meta::new(payload, model);
    let words = &meta.words;

    let mut fields: Vec<Field> = schema
        .fields
        .iter()
        .map(|spec| Field {
            name: Cow::Borrowed(spec.name),
            index: spec.index,
            raw: words[spec.index],
            value: spec.transform.apply(words[spec.index]),
            unit: spec.unit,
        })
        .collect();
    for (index, raw) in words.iter().enumerate().skip(schema.words) {
        fields.push(Field {
            name: Cow::Owned(format!("Undocumented:{index}")),
            index,
            raw: *raw,
            value: Transform::Identity.apply(*raw),
            unit: "",
        });
    }

    Ok(Record {
        kind: schema.kind,
        fields,
        meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn on_off(code: u16) -> Option<&'static str> {
        match code {
            0 => Some("OFF"),
            1 => Some("ON"),
            _ => None,
        }
    }

    static ON_OFF: EnumTable = EnumTable::new("OnOff", on_off);

    static FIELDS: [FieldSpec; 3] = [
        FieldSpec::new("Count", 0, Transform::Identity, ""),
        FieldSpec::new("Voltage", 1, Transform::TENTHS, "V"),
        FieldSpec::new("Switch", 2, Transform::Lookup(&ON_OFF), ""),
    ];

    static SCHEMA: Schema = Schema {
        kind: RecordKind::Status,
        words: 3,
        fields: &FIELDS,
    };

    #[test]
    fn scaling() {
        assert_eq!(
            Transform::TENTHS.apply(0x00DC),
            Value::Scaled {
                value: 22.0,
                decimals: 1
            }
        );
        assert_eq!(Transform::TENTHS.apply(0x0044).to_string(), "6.8");
        assert_eq!(Transform::TENTHS.apply(0x00DC).to_string(), "22.0");
        assert_eq!(Transform::TENTHS.apply(2305).to_string(), "230.5");
    }

    #[test]
    fn bit_string() {
        let alarm = Transform::BitString { width: 4 };
        assert_eq!(alarm.apply(0).to_string(), "0000");
        assert_eq!(alarm.apply(5).to_string(), "0101");
        assert_eq!(alarm.apply(0b10110).to_string(), "10110");
    }

    #[test]
    fn unknown_codes_map_to_na() {
        assert_eq!(ON_OFF.label(1), "ON");
        for code in [2, 9, 0x7FFF, u16::MAX] {
            assert_eq!(ON_OFF.label(code), UNKNOWN_LABEL);
            assert!(!ON_OFF.contains(code));
        }
    }

    #[test]
    fn decode_fields_in_order() {
        let record = decode(&[0x00, 0x07, 0x08, 0xFC, 0x00, 0x01], &SCHEMA, "test").unwrap();
        let names: Vec<_> = record.iter().map(|field| field.name.as_ref()).collect();
        assert_eq!(names, ["Count", "Voltage", "Switch"]);
        let voltage = record.get("Voltage").unwrap();
        assert_eq!(voltage.raw, 2300);
        assert_eq!(voltage.to_string(), "1,2300,230.0,V");
        assert_eq!(record.get("Switch").unwrap().value, Value::Label("ON"));
        assert_eq!(record.meta.hex, "00 07 08 FC 00 01");
        assert_eq!(record.words(), &[7, 2300, 1]);
    }

    #[test]
    fn trailing_words_are_undocumented() {
        let record = decode(&[0, 1, 0, 2, 0, 3, 0xAB, 0xCD], &SCHEMA, "test").unwrap();
        let extra = record.get("Undocumented:3").unwrap();
        assert_eq!(extra.index, 3);
        assert_eq!(extra.raw, 0xABCD);
        assert_eq!(extra.value, Value::Number(0xABCD));
        assert_eq!(extra.unit, "");
        assert_eq!(record.fields.len(), 4);
    }

    #[test]
    fn odd_payload_is_malformed() {
        assert_matches!(
            decode(&[0, 1, 0, 2, 0, 3, 0], &SCHEMA, "test"),
            Err(Error::MalformedPayload {
                length: 7,
                required: 6
            })
        );
    }

    #[test]
    fn short_payload_is_malformed() {
        assert_matches!(
            decode(&[0, 1, 0, 2], &SCHEMA, "test"),
            Err(Error::MalformedPayload { length: 4, .. })
        );
        assert_matches!(
            decode(&[], &SCHEMA, "test"),
            Err(Error::MalformedPayload { length: 0, .. })
        );
    }
}
