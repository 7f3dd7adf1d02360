//! Per-subsystem attribute record built by one snapshot.

use crate::cpu;
use crate::field::{Field, NOT_INITIALIZED};
use crate::subsystem::Subsystem;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Text(String),
    IntList(Vec<i64>),
    TextList(Vec<String>),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{}", value),
            Value::Text(value) => write!(f, "{}", value),
            Value::IntList(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(" "))
            }
            Value::TextList(values) => write!(f, "{}", values.join(" ")),
        }
    }
}

/// Named attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    CoreCount,
    FreqAvailable,
    FreqCurrent,
    FreqMax,
    FreqMin,
    GovernorAvailable,
    Governor,
    Temperature,
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Attribute::CoreCount => "core_count",
            Attribute::FreqAvailable => "freq_available",
            Attribute::FreqCurrent => "freq_current",
            Attribute::FreqMax => "freq_max",
            Attribute::FreqMin => "freq_min",
            Attribute::GovernorAvailable => "governor_available",
            Attribute::Governor => "governor",
            Attribute::Temperature => "temperature",
        };
        write!(f, "{}", name)
    }
}

/// How raw file content becomes a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    /// A single integer.
    Int,
    /// A single non-empty string.
    Text,
    /// A core range list such as `0-7`, decoded to a core count.
    CoreRange,
    /// Whitespace-separated integers, sorted ascending.
    IntList,
    /// Whitespace-separated words, sorted.
    TextList,
    /// Smallest entry of an integer list.
    ListMin,
    /// Largest entry of an integer list.
    ListMax,
}

impl Decoder {
    /// List fields never count against validity.
    pub fn is_list(&self) -> bool {
        matches!(self, Decoder::IntList | Decoder::TextList)
    }

    /// Decodes content; `None` (unreadable) is always `Invalid`.
    pub fn decode(&self, content: Option<&str>) -> Field<Value> {
        let content = match content {
            Some(content) => content.trim(),
            None => return Field::Invalid,
        };

        match self {
            Decoder::Int => Field::from_option(content.parse::<i64>().ok().map(Value::Int)),
            Decoder::Text => {
                if content.is_empty() {
                    Field::Invalid
                } else {
                    Field::Resolved(Value::Text(content.to_string()))
                }
            }
            Decoder::CoreRange => {
                Field::from_option(cpu::parse_core_count(content).map(Value::Int))
            }
            Decoder::IntList => Field::Resolved(Value::IntList(cpu::parse_frequencies(content))),
            Decoder::TextList => Field::Resolved(Value::TextList(cpu::parse_governors(content))),
            Decoder::ListMin => Field::from_option(
                cpu::parse_frequencies(content).first().copied().map(Value::Int),
            ),
            Decoder::ListMax => Field::from_option(
                cpu::parse_frequencies(content).last().copied().map(Value::Int),
            ),
        }
    }
}

/// Where an attribute comes from and how to decode it.
///
/// A spec without a path could not be located; its field is abandoned as
/// `Invalid` rather than escalated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub attribute: Attribute,
    pub path: Option<String>,
    pub decoder: Decoder,
}

impl FieldSpec {
    pub fn new(attribute: Attribute, path: impl Into<String>, decoder: Decoder) -> Self {
        Self {
            attribute,
            path: Some(path.into()),
            decoder,
        }
    }

    /// A spec for an attribute with no known source.
    pub fn unlocated(attribute: Attribute, decoder: Decoder) -> Self {
        Self {
            attribute,
            path: None,
            decoder,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    spec: FieldSpec,
    field: Field<Value>,
}

/// Mutable record of attribute values for one subsystem snapshot.
#[derive(Debug, Clone)]
pub struct FieldSet {
    subsystem: Subsystem,
    slots: Vec<Slot>,
}

impl FieldSet {
    /// Creates a fresh set with every slot unset.
    pub fn new(subsystem: Subsystem, specs: Vec<FieldSpec>) -> Self {
        Self {
            subsystem,
            slots: specs
                .into_iter()
                .map(|spec| Slot {
                    spec,
                    field: Field::Unset,
                })
                .collect(),
        }
    }

    pub fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the field for an attribute, if this set carries it.
    pub fn get(&self, attribute: Attribute) -> Option<&Field<Value>> {
        self.slot(attribute).map(|slot| &slot.field)
    }

    /// Overwrites the field for an attribute. Returns false if absent.
    pub fn set(&mut self, attribute: Attribute, field: Field<Value>) -> bool {
        match self.slots.iter_mut().find(|s| s.spec.attribute == attribute) {
            Some(slot) => {
                slot.field = field;
                true
            }
            None => false,
        }
    }

    /// The path an attribute is read from.
    pub fn path(&self, attribute: Attribute) -> Option<&str> {
        self.slot(attribute).and_then(|slot| slot.spec.path.as_deref())
    }

    /// Iterates attributes with their fields, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Attribute, &Field<Value>)> {
        self.slots.iter().map(|slot| (slot.spec.attribute, &slot.field))
    }

    /// True while any field is unset or pending.
    pub fn is_initializing(&self) -> bool {
        self.slots.iter().any(|slot| slot.field.is_initializing())
    }

    /// True when every scalar field is pending or resolved.
    pub fn is_valid(&self) -> bool {
        self.slots
            .iter()
            .filter(|slot| !slot.spec.decoder.is_list())
            .all(|slot| slot.field.is_valid())
    }

    /// Turns every `Invalid` field back into `Unset`.
    pub fn reset_invalid(&mut self) {
        for slot in &mut self.slots {
            slot.field.reset_invalid();
        }
    }

    pub fn int(&self, attribute: Attribute) -> Field<i64> {
        self.typed(attribute, |value| match value {
            Value::Int(v) => Some(v),
            _ => None,
        })
    }

    pub fn text(&self, attribute: Attribute) -> Field<String> {
        self.typed(attribute, |value| match value {
            Value::Text(v) => Some(v),
            _ => None,
        })
    }

    pub fn int_list(&self, attribute: Attribute) -> Field<Vec<i64>> {
        self.typed(attribute, |value| match value {
            Value::IntList(v) => Some(v),
            _ => None,
        })
    }

    pub fn text_list(&self, attribute: Attribute) -> Field<Vec<String>> {
        self.typed(attribute, |value| match value {
            Value::TextList(v) => Some(v),
            _ => None,
        })
    }

    /// Raw integer projection; an absent attribute reads as not initialized.
    pub fn raw_int(&self, attribute: Attribute) -> i64 {
        match self.get(attribute) {
            Some(_) => self.int(attribute).raw(),
            None => NOT_INITIALIZED,
        }
    }

    /// Raw string projection.
    pub fn raw_text(&self, attribute: Attribute) -> String {
        self.text(attribute).raw()
    }

    fn typed<T>(&self, attribute: Attribute, f: impl FnOnce(Value) -> Option<T>) -> Field<T> {
        match self.get(attribute) {
            Some(field) => field.clone().and_then(f),
            None => Field::Unset,
        }
    }

    fn slot(&self, attribute: Attribute) -> Option<&Slot> {
        self.slots.iter().find(|s| s.spec.attribute == attribute)
    }

    /// Distinct paths of every located field, in declaration order.
    pub(crate) fn paths(&self) -> Vec<String> {
        distinct(self.slots.iter().filter_map(|s| s.spec.path.as_deref()))
    }

    /// Distinct paths of located fields that are still unset.
    pub(crate) fn unset_paths(&self) -> Vec<String> {
        distinct(
            self.slots
                .iter()
                .filter(|s| matches!(s.field, Field::Unset))
                .filter_map(|s| s.spec.path.as_deref()),
        )
    }

    /// Marks every unset field reading `path` as pending.
    pub(crate) fn mark_pending(&mut self, path: &str) {
        for slot in &mut self.slots {
            if matches!(slot.field, Field::Unset) && slot.spec.path.as_deref() == Some(path) {
                slot.field = Field::Pending;
            }
        }
    }

    /// Decodes content into every initializing field reading `path`.
    pub(crate) fn apply(&mut self, path: &str, content: Option<&str>) {
        for slot in &mut self.slots {
            if slot.field.is_initializing() && slot.spec.path.as_deref() == Some(path) {
                slot.field = slot.spec.decoder.decode(content);
            }
        }
    }

    /// Gives up on unset fields that have no path.
    pub(crate) fn abandon_pathless(&mut self) {
        for slot in &mut self.slots {
            if slot.spec.path.is_none() && matches!(slot.field, Field::Unset) {
                slot.field = Field::Invalid;
            }
        }
    }
}

fn distinct<'a>(paths: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for path in paths {
        if !out.iter().any(|p| p == path) {
            out.push(path.to_string());
        }
    }
    out
}

impl Serialize for FieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for slot in &self.slots {
            map.serialize_entry(&slot.spec.attribute, &slot.field)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FieldSet {
        FieldSet::new(
            Subsystem::Cpu,
            vec![
                FieldSpec::new(Attribute::CoreCount, "/present", Decoder::CoreRange),
                FieldSpec::new(Attribute::FreqAvailable, "/avail", Decoder::IntList),
                FieldSpec::new(Attribute::FreqCurrent, "/cur", Decoder::Int),
                FieldSpec::new(Attribute::Governor, "/gov", Decoder::Text),
            ],
        )
    }

    #[test]
    fn test_decoders() {
        assert_eq!(Decoder::Int.decode(None), Field::Invalid);
        assert_eq!(
            Decoder::Int.decode(Some(" 42 ")),
            Field::Resolved(Value::Int(42))
        );
        assert_eq!(Decoder::Int.decode(Some("x")), Field::Invalid);
        assert_eq!(Decoder::Text.decode(Some("")), Field::Invalid);
        assert_eq!(
            Decoder::CoreRange.decode(Some("0-7")),
            Field::Resolved(Value::Int(8))
        );
        assert_eq!(
            Decoder::IntList.decode(Some("1400000 200000 800000")),
            Field::Resolved(Value::IntList(vec![200000, 800000, 1400000]))
        );
        assert_eq!(
            Decoder::IntList.decode(Some("")),
            Field::Resolved(Value::IntList(vec![]))
        );
        assert_eq!(
            Decoder::ListMin.decode(Some("300 100 200")),
            Field::Resolved(Value::Int(100))
        );
        assert_eq!(
            Decoder::ListMax.decode(Some("300 100 200")),
            Field::Resolved(Value::Int(300))
        );
        assert_eq!(Decoder::ListMax.decode(Some("")), Field::Invalid);
    }

    #[test]
    fn test_fresh_set_is_initializing() {
        let set = sample();
        assert!(set.is_initializing());
        assert!(!set.is_valid());
        assert_eq!(set.raw_int(Attribute::FreqCurrent), NOT_INITIALIZED);
        assert_eq!(set.raw_text(Attribute::Governor), "---3");
    }

    #[test]
    fn test_validity_ignores_lists() {
        let mut set = sample();
        set.apply("/present", Some("0-3"));
        set.apply("/cur", Some("1400000"));
        set.apply("/gov", Some("schedutil"));
        set.apply("/avail", None);

        assert!(set.is_valid());
        assert!(!set.is_initializing());
        assert!(set.int_list(Attribute::FreqAvailable).raw().is_empty());
    }

    #[test]
    fn test_reset_invalid_is_idempotent() {
        let mut set = sample();
        for path in set.paths() {
            set.apply(&path, None);
        }
        set.reset_invalid();
        let once: Vec<_> = set.iter().map(|(a, f)| (a, f.clone())).collect();
        set.reset_invalid();
        let twice: Vec<_> = set.iter().map(|(a, f)| (a, f.clone())).collect();
        assert_eq!(once, twice);
        assert!(set.iter().all(|(_, f)| *f == Field::Unset));
    }

    #[test]
    fn test_pending_fields_are_not_reissued() {
        let mut set = sample();
        set.mark_pending("/cur");
        assert_eq!(set.raw_int(Attribute::FreqCurrent), -2);
        assert!(!set.unset_paths().contains(&"/cur".to_string()));
        assert!(set.is_initializing());
    }

    #[test]
    fn test_shared_path_is_listed_once() {
        let set = FieldSet::new(
            Subsystem::Gpu,
            vec![
                FieldSpec::new(Attribute::FreqAvailable, "/avail", Decoder::IntList),
                FieldSpec::new(Attribute::FreqMax, "/avail", Decoder::ListMax),
                FieldSpec::new(Attribute::FreqMin, "/avail", Decoder::ListMin),
                FieldSpec::unlocated(Attribute::FreqCurrent, Decoder::Int),
            ],
        );
        assert_eq!(set.unset_paths(), vec!["/avail".to_string()]);
    }

    #[test]
    fn test_abandon_pathless() {
        let mut set = FieldSet::new(
            Subsystem::Gpu,
            vec![FieldSpec::unlocated(Attribute::FreqCurrent, Decoder::Int)],
        );
        set.abandon_pathless();
        assert_eq!(set.get(Attribute::FreqCurrent), Some(&Field::Invalid));
        assert!(!set.is_initializing());
    }

    #[test]
    fn test_type_mismatch_is_invalid() {
        let mut set = sample();
        set.apply("/gov", Some("performance"));
        assert_eq!(set.int(Attribute::Governor), Field::Invalid);
        assert_eq!(set.int(Attribute::Temperature), Field::Unset);
    }
}
