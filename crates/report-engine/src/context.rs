//! Render data: a tagged [`Value`] tree plus the scope chain built while expanding blocks.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// A context value.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Context),
}

impl Value {
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::List(_) | Value::Map(_))
    }

    pub fn as_map(&self) -> Option<&Context> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The list, if every element is a mapping.
    pub fn as_list_of_maps(&self) -> Option<&[Value]> {
        self.as_list()
            .filter(|items| items.iter().all(|item| item.as_map().is_some()))
    }
}

/// Largest magnitude below which every whole `f64` is exactly an `i64`.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            // Whole floats print as `2`, not `2.0`.
            Value::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT_INT => {
                serializer.serialize_i64(*f as i64)
            }
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => serializer.collect_seq(items),
            Value::Map(map) => map.serialize(serializer),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Context> for Value {
    fn from(value: Context) -> Self {
        Value::Map(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

/// A mapping from names to values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(BTreeMap<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether `key` is bound to a list.
    pub fn is_sequence(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v.as_list().is_some())
    }

    /// The list bound to `key`, if every element is a mapping.
    pub fn element_contexts(&self, key: &str) -> Result<&[Value], UnresolvedProperty> {
        self.get(key)
            .and_then(Value::as_list_of_maps)
            .ok_or_else(|| UnresolvedProperty::new(key))
    }

    /// A new mapping holding every entry of `global`, overwritten by the entries of `local`.
    pub fn merge(local: &Context, global: &Context) -> Context {
        let mut merged = global.clone();
        merged
            .0
            .extend(local.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

impl FromIterator<(String, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Context(iter.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Context {
    fn from(entries: [(K, V); N]) -> Self {
        entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect()
    }
}

/// A property that was expected to hold a list of mappings.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("context property `{property}` is not a list of mappings")]
pub struct UnresolvedProperty {
    pub property: String,
}

impl UnresolvedProperty {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }
}

#[derive(Copy, Clone)]
enum Vars<'a> {
    /// Every entry of a mapping.
    Map(&'a Context),
    /// A single name.
    Binding(&'a str, &'a Value),
    /// The current element of a `range` block: its fields, plus the block's property rebound
    /// to the element itself.
    Element(&'a str, &'a Value),
}

/// A read-only view of the variables visible while rendering a row.
///
/// Each block iteration or array-driven row pushes an overlay on top of its parent instead
/// of copying or mutating the parent's data, so nothing an iteration binds can leak out of it.
#[derive(Copy, Clone)]
pub struct Scope<'a> {
    vars: Vars<'a>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn root(context: &'a Context) -> Self {
        Self {
            vars: Vars::Map(context),
            parent: None,
        }
    }

    /// `local` shadowing `parent`.
    pub fn merge(local: &'a Context, parent: &'a Scope<'a>) -> Self {
        Self {
            vars: Vars::Map(local),
            parent: Some(parent),
        }
    }

    /// `key` rebound to `value`, everything else read from `parent`.
    pub fn bind(key: &'a str, value: &'a Value, parent: &'a Scope<'a>) -> Self {
        Self {
            vars: Vars::Binding(key, value),
            parent: Some(parent),
        }
    }

    /// Scope for one element of `{{range key}}`.
    pub fn element(key: &'a str, element: &'a Value, parent: &'a Scope<'a>) -> Self {
        Self {
            vars: Vars::Element(key, element),
            parent: Some(parent),
        }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            let found = match current.vars {
                Vars::Map(map) => map.get(key),
                Vars::Binding(name, value) => (name == key).then_some(value),
                Vars::Element(name, element) => element
                    .as_map()
                    .and_then(|fields| fields.get(key))
                    .or_else(|| (name == key).then_some(element)),
            };
            if found.is_some() {
                return found;
            }
            scope = current.parent;
        }
        None
    }

    /// Resolve a dotted path such as `customer.address.city` or `items.0.sku`.
    ///
    /// A list can only be indexed by position; asking one for a named field yields `None`.
    pub fn lookup(&self, path: &str) -> Option<&'a Value> {
        let mut segments = path.split('.');
        let mut value = self.get(segments.next()?)?;
        for segment in segments {
            value = match value {
                Value::Map(map) => map.get(segment)?,
                Value::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(value)
    }

    pub fn is_sequence(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v.as_list().is_some())
    }

    pub fn element_contexts(&self, key: &str) -> Result<&'a [Value], UnresolvedProperty> {
        self.get(key)
            .and_then(Value::as_list_of_maps)
            .ok_or_else(|| UnresolvedProperty::new(key))
    }

    /// Every visible variable, innermost binding winning.
    pub fn flatten(&self) -> BTreeMap<&'a str, &'a Value> {
        let mut chain = Vec::new();
        let mut scope = Some(self);
        while let Some(current) = scope {
            chain.push(current.vars);
            scope = current.parent;
        }

        let mut out = BTreeMap::new();
        for vars in chain.into_iter().rev() {
            match vars {
                Vars::Map(map) => out.extend(map.iter()),
                Vars::Binding(name, value) => {
                    out.insert(name, value);
                }
                Vars::Element(name, element) => {
                    out.insert(name, element);
                    if let Some(fields) = element.as_map() {
                        out.extend(fields.iter());
                    }
                }
            }
        }
        out
    }

    /// Owned copy of [`Scope::flatten`].
    pub fn to_context(&self) -> Context {
        self.flatten()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

impl Serialize for Scope<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let vars = self.flatten();
        let mut map = serializer.serialize_map(Some(vars.len()))?;
        for (key, value) in vars {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.flatten()).finish()
    }
}
