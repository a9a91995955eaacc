//! # Fact Model
//!
//! The normalized unit every discoverer produces.
//!
//! A [`FactRecord`] groups [`Entity`] descriptors under a small fixed set of
//! [`Category`] keys. Each entity is a flat bag of named attributes whose
//! values are scalars or nested mappings (e.g. an address family keyed to an
//! address).
//!
//! Records are built fresh on every probe cycle and moved into the output
//! channel, so the producer cannot touch them afterwards.

use std::collections::BTreeMap;
use std::net::IpAddr;

use pnet::util::MacAddr;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Top-level grouping of entities inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Devices,
    Interfaces,
    Networks,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Devices => "devices",
            Category::Interfaces => "interfaces",
            Category::Networks => "networks",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Bool(bool),
    Ip(IpAddr),
    Mac(MacAddr),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ip(&self) -> Option<IpAddr> {
        match self {
            Value::Ip(ip) => Some(*ip),
            _ => None,
        }
    }

    pub fn as_mac(&self) -> Option<MacAddr> {
        match self {
            Value::Mac(mac) => Some(*mac),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Ip(ip) => serializer.collect_str(ip),
            Value::Mac(mac) => serializer.collect_str(mac),
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u16> for Value {
    fn from(i: u16) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u8> for Value {
    fn from(i: u8) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<IpAddr> for Value {
    fn from(ip: IpAddr) -> Self {
        Value::Ip(ip)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(ip: std::net::Ipv4Addr) -> Self {
        Value::Ip(IpAddr::V4(ip))
    }
}

impl From<MacAddr> for Value {
    fn from(mac: MacAddr) -> Self {
        Value::Mac(mac)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

/// A single described thing: a device, an interface, a network.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct Entity {
    attrs: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The structured unit handed to the output channel.
///
/// An empty record is legal and simply carries no information.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactRecord {
    source: Option<String>,
    categories: BTreeMap<Category, Vec<Entity>>,
}

impl FactRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entity` to `category`, preserving insertion order.
    pub fn push(&mut self, category: Category, entity: Entity) {
        self.categories.entry(category).or_default().push(entity);
    }

    pub fn with(mut self, category: Category, entity: Entity) -> Self {
        self.push(category, entity);
        self
    }

    pub fn entities(&self, category: Category) -> &[Entity] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn devices(&self) -> &[Entity] {
        self.entities(Category::Devices)
    }

    pub fn interfaces(&self) -> &[Entity] {
        self.entities(Category::Interfaces)
    }

    pub fn networks(&self) -> &[Entity] {
        self.entities(Category::Networks)
    }

    pub fn categories(&self) -> impl Iterator<Item = (Category, &[Entity])> {
        self.categories.iter().map(|(c, e)| (*c, e.as_slice()))
    }

    /// Total number of entities over all categories.
    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the discoverer that produced this record, stamped on enqueue.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Serialize for FactRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let populated = self.categories.iter().filter(|(_, e)| !e.is_empty());
        let len = populated.clone().count() + usize::from(self.source.is_some());

        let mut out = serializer.serialize_map(Some(len))?;
        if let Some(source) = &self.source {
            out.serialize_entry("source", source)?;
        }
        for (category, entities) in populated {
            out.serialize_entry(category.as_str(), entities)?;
        }
        out.end()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
